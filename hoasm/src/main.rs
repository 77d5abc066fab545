use anyhow::{Context, Result};
use hoasm::assemble;
use libhorizon::load::to_binary;
use std::io::Read;
use std::{
    env,
    fs::{self, File},
};

fn main() -> Result<()> {
    env_logger::init();

    let filename: String = env::args()
        .nth(1)
        .ok_or_else(|| anyhow::Error::msg("Need an input filename"))?;
    let output_name: String = env::args()
        .nth(2)
        .ok_or_else(|| anyhow::Error::msg("Need an output filename"))?;
    let mut file = File::open(&filename).with_context(|| format!("Couldn't open {}", filename))?;
    let mut program_text = String::new();
    file.read_to_string(&mut program_text)?;

    let assembly = assemble(&program_text);
    for diagnostic in &assembly.diagnostics {
        eprintln!("{}:{}", filename, diagnostic);
    }
    let words = assembly.words()?;

    fs::write(format!("{}.bin", output_name), to_binary(&words))?;
    fs::write(format!("{}.hdb", output_name), assembly.debug.to_json()?)?;

    Ok(())
}
