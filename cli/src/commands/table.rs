use anyhow::Result;

use crate::cli::{Cli, TableArgs};

pub fn run(_cli: &Cli, args: &TableArgs) -> Result<()> {
    let config = super::load_config(args.config.as_deref())?;
    let table = config.fraction_table()?;

    println!("{:>8}  {}", "zone", "fi");
    for (zone, fi) in table.sorted() {
        println!("{zone:>8}  {fi}");
    }
    Ok(())
}
