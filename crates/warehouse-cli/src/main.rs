//! The `warehouse` command-line tool.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    warehouse_cli::cli::cli()
}
