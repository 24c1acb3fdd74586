use anyhow::Result;

fn main() -> Result<()> {
    aspect_cli::main_entry()
}
