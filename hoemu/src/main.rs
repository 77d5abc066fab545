use std::{env, fs, path::Path};

use anyhow::{Context, Result};
use hodbg::Hdb;
use libhorizon::{
    debugger::HdbDebugger,
    load::load_binary_from,
    op::Register,
    vm_with_program, HorizonVm, Word,
};
use log::info;

const DEFAULT_MAX_CYCLES: u64 = 1_000_000;

/// Words plus whatever debug symbols came with them.
fn load_program(filename: &str) -> Result<(Vec<Word>, Option<Hdb>)> {
    let path = Path::new(filename);
    if path.extension().map_or(false, |ext| ext == "hasm") {
        let text =
            fs::read_to_string(path).with_context(|| format!("Couldn't open {}", filename))?;
        let assembly = hoasm::assemble(&text);
        for diagnostic in &assembly.diagnostics {
            eprintln!("{}:{}", filename, diagnostic);
        }
        let words = assembly.words()?;
        return Ok((words, Some(assembly.debug)));
    }

    let words =
        load_binary_from(path).with_context(|| format!("Couldn't load {}", filename))?;
    let symbols = match fs::read_to_string(path.with_extension("hdb")) {
        Ok(text) => Some(Hdb::from_json(&text).context("Couldn't read debug symbols")?),
        Err(_) => None,
    };
    Ok((words, symbols))
}

fn dump(vm: &HorizonVm) {
    for (row, values) in vm.registers().chunks(4).enumerate() {
        let line = values
            .iter()
            .enumerate()
            .filter_map(|(col, value)| {
                let register = Register::from_u8((row * 4 + col) as u8)?;
                Some(format!("{:>3}: {:#010X}", register.name(), value))
            })
            .collect::<Vec<_>>()
            .join("  ");
        println!("{}", line);
    }
    println!(
        "flags: {}{}{}  cycles: {}",
        if vm.flags.z { 'Z' } else { '-' },
        if vm.flags.n { 'N' } else { '-' },
        if vm.flags.v { 'V' } else { '-' },
        vm.cycles
    );
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let trace = args.iter().any(|arg| arg == "--trace");
    let mut positional = args.iter().filter(|arg| !arg.starts_with("--"));

    let filename = positional
        .next()
        .ok_or_else(|| anyhow::Error::msg("Need a program (.hasm or .bin)"))?;
    let max_cycles = match positional.next() {
        Some(limit) => limit
            .parse::<u64>()
            .with_context(|| format!("Bad cycle limit {}", limit))?,
        None => DEFAULT_MAX_CYCLES,
    };

    let (program, symbols) = load_program(filename)?;
    let mut vm = vm_with_program(&program);
    if trace {
        let debugger = match symbols {
            Some(hdb) => HdbDebugger::with_symbols(hdb),
            None => HdbDebugger::new(),
        };
        vm.debugger = Some(Box::new(debugger));
    }

    let reason = vm.run_until(max_cycles);
    info!("stopped after {} cycles: {:?}", vm.cycles, reason);

    dump(&vm);
    println!("stopped: {:?}", reason);

    Ok(())
}
