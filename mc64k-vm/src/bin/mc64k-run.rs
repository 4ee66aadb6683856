use std::io;

use mc64k::logging::{category_host, category_machine, category_step, status_label};
use mc64k::{
    Image, Machine, MachineConfig, MachineSnapshot, MachineStatus, disassemble, disassemble_one,
    host, render_fault,
};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliConfig {
    image: Option<String>,
    entry: usize,
    stack_size: usize,
    disasm: bool,
    step: bool,
    json: bool,
    help: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            image: None,
            entry: 0,
            stack_size: MachineConfig::default().stack_size,
            disasm: false,
            step: false,
            json: false,
            help: false,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_cli_args(&args).map_err(io::Error::other)?;
    if cli.help {
        print_usage();
        return Ok(());
    }
    mc64k::init_logging()?;

    let path = cli
        .image
        .as_deref()
        .ok_or_else(|| io::Error::other("missing image path"))?;
    let image = Image::load(path)?;
    if cli.disasm {
        print!("{}", disassemble(image.code())?);
        return Ok(());
    }

    let mut machine = Machine::with_config(
        &image,
        MachineConfig {
            stack_size: cli.stack_size,
        },
    )?;
    machine.register_module(host::mem::module());
    for module in machine.host_table().modules() {
        info!("{} module #{} ({})", category_host(), module.id(), module.name());
    }

    // SAFETY: the runner executes whatever memory the image addresses.
    unsafe { machine.enter(cli.entry)? };
    info!(
        "{} loaded {} ({} bytes of code), entry {:#06x}",
        category_machine(),
        path,
        image.code().len(),
        cli.entry
    );

    let status = if cli.step {
        run_stepper(&mut machine)?
    } else {
        machine.run()
    };
    info!("{} finished: {}", category_machine(), status_label(status));

    print_state(&machine, cli.json)?;
    if let Some(report) = render_fault(&machine) {
        eprintln!("{report}");
    }
    if status.is_fault() {
        std::process::exit(1);
    }
    Ok(())
}

fn parse_cli_args(args: &[String]) -> Result<CliConfig, String> {
    let mut cfg = CliConfig::default();
    let mut index = 0usize;
    while index < args.len() {
        match args[index].as_str() {
            "-h" | "--help" => {
                cfg.help = true;
                index += 1;
            }
            "--entry" => {
                let raw = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --entry".to_string())?;
                cfg.entry = parse_number(raw).ok_or_else(|| format!("invalid --entry value '{raw}'"))?;
                index += 2;
            }
            "--stack" => {
                let raw = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --stack".to_string())?;
                let value =
                    parse_number(raw).ok_or_else(|| format!("invalid --stack value '{raw}'"))?;
                if value == 0 {
                    return Err("--stack must be non-zero".to_string());
                }
                cfg.stack_size = value;
                index += 2;
            }
            "--disasm" => {
                cfg.disasm = true;
                index += 1;
            }
            "--step" => {
                cfg.step = true;
                index += 1;
            }
            "--json" => {
                cfg.json = true;
                index += 1;
            }
            value if value.starts_with('-') => {
                return Err(format!("unknown flag '{value}'"));
            }
            path => {
                if cfg.image.is_some() {
                    return Err("multiple image paths provided".to_string());
                }
                cfg.image = Some(path.to_string());
                index += 1;
            }
        }
    }

    if cfg.disasm && (cfg.step || cfg.json) {
        return Err("--disasm cannot be combined with --step or --json".to_string());
    }
    if !cfg.help && cfg.image.is_none() {
        return Err("missing image path".to_string());
    }
    Ok(cfg)
}

fn parse_number(raw: &str) -> Option<usize> {
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

fn print_usage() {
    println!("Usage:");
    println!("  mc64k-run <image> [--entry <offset>] [--stack <bytes>] [--json]");
    println!("  mc64k-run <image> --step [--entry <offset>]");
    println!("  mc64k-run <image> --disasm");
}

fn run_stepper(machine: &mut Machine) -> Result<MachineStatus, Box<dyn std::error::Error>> {
    println!("commands: <enter> step, c continue, r registers, q quit");
    let mut editor = DefaultEditor::new()?;
    loop {
        let status = machine.status();
        if status.is_terminal() {
            return Ok(status);
        }
        if let Ok((text, _)) = disassemble_one(machine.code(), machine.cursor()) {
            println!("{} {:04x}: {text}", category_step(), machine.cursor());
        }
        match editor.readline("mc64k> ") {
            Ok(line) => {
                let line = line.trim();
                if !line.is_empty() {
                    let _ = editor.add_history_entry(line);
                }
                match line {
                    "" | "s" => {
                        machine.step();
                    }
                    "c" => return Ok(machine.run()),
                    "r" => print_state(machine, false)?,
                    "q" => return Ok(machine.status()),
                    other => println!("unknown command '{other}'"),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                return Ok(machine.status());
            }
            Err(err) => return Err(err.into()),
        }
    }
}

fn print_state(machine: &Machine, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = MachineSnapshot::capture(machine);
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }
    println!(
        "status: {}  cursor: {:#06x}  depth: {}",
        snapshot.status, snapshot.cursor, snapshot.call_depth
    );
    for (row, chunk) in snapshot.gpr.chunks(4).enumerate() {
        let cells: Vec<String> = chunk
            .iter()
            .enumerate()
            .map(|(col, bits)| format!("r{:<2} {bits:#018x}", row * 4 + col))
            .collect();
        println!("  {}", cells.join("  "));
    }
    for (row, chunk) in snapshot.fpr.chunks(4).enumerate() {
        let cells: Vec<String> = chunk
            .iter()
            .enumerate()
            .map(|(col, bits)| format!("fp{:<2} {:>18}", row * 4 + col, f64::from_bits(*bits)))
            .collect();
        println!("  {}", cells.join("  "));
    }
    Ok(())
}
