//! vr4300: um emulador da CPU do N64 em Rust!
//!
//! O arquivo [main.rs](src/main.rs) toma conta apenas do CLI do emulador.
//! Implementação do emulador em si está na biblioteca.

use clap::{crate_version, App, Arg, ArgMatches, SubCommand};
use color_eyre::eyre::{eyre, Result, WrapErr};
use goblin::elf::Elf;
use log::info;

use std::fs::{self, File};

use vr4300::emulator::reporter::{TraceEvent, TraceReporter};
use vr4300::emulator::{Config, Cpu, Instruction, Ram, Register};

/// Physical address behind a kseg0/kseg1 address.
const PHYS_MASK: u32 = 0x1fff_ffff;

fn arg<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .value_of(name)
        .ok_or_else(|| eyre!("missing argument `{}`", name))
}

/// Lê um endereço em hexadecimal, com ou sem o prefixo `0x`.
fn parse_addr(s: &str) -> Result<u32> {
    let digits = s.trim_start_matches("0x");
    u32::from_str_radix(digits, 16).wrap_err_with(|| format!("invalid address `{}`", s))
}

/// Palavras big-endian. Um resto de menos de 4 bytes é ignorado.
fn words(bytes: &[u8]) -> impl Iterator<Item = u32> + '_ {
    bytes.chunks_exact(4).map(|b| {
        let mut owned_b = [0u8; 4];
        owned_b.copy_from_slice(b);
        u32::from_be_bytes(owned_b)
    })
}

/// Uma imagem carregada na RAM, pronta para executar.
struct Image {
    ram: Ram,
    entry: u32,
}

impl Image {
    /// A raw big-endian binary placed at `base`.
    fn from_raw(bytes: &[u8], base: u32) -> Result<Image> {
        let mut ram = Ram::new();
        ram.load_bytes(base & PHYS_MASK, bytes)?;
        Ok(Image { ram, entry: base })
    }

    /// Carrega cada segmento carregável em seu respectivo endereço.
    fn from_elf(bytes: &[u8]) -> Result<Image> {
        let elf = Elf::parse(bytes).wrap_err("elf: parse failed")?;
        if elf.little_endian {
            return Err(eyre!("elf: expected a big-endian MIPS image"));
        }

        let mut ram = Ram::new();
        for segment in &elf.program_headers {
            if segment.p_type != goblin::elf::program_header::PT_LOAD {
                continue;
            }
            let addr = segment.p_vaddr as u32 & PHYS_MASK;
            info!("elf: loading {} bytes to {:#010x}", segment.p_filesz, addr);

            let start = segment.p_offset as usize;
            let end = start + segment.p_filesz as usize;
            let data = bytes
                .get(start..end)
                .ok_or_else(|| eyre!("elf: segment at {:#x} runs past the file", start))?;
            ram.load_bytes(addr, data)?;
        }

        Ok(Image {
            ram,
            entry: elf.entry as u32,
        })
    }
}

fn run_args<'a, 'b>(cmd: App<'a, 'b>) -> App<'a, 'b> {
    cmd.arg(Arg::with_name("file").index(1).required(true))
        .arg(
            Arg::with_name("budget")
                .long("budget")
                .short("b")
                .takes_value(true)
                .default_value("1000000")
                .help("Ciclos a executar"),
        )
        .arg(
            Arg::with_name("steps")
                .long("steps")
                .takes_value(true)
                .help("Instruções a executar, no lugar de --budget"),
        )
        .arg(
            Arg::with_name("no-load-delay")
                .long("no-load-delay")
                .help("Loads escrevem o registrador imediatamente"),
        )
        .arg(
            Arg::with_name("load-state")
                .long("load-state")
                .takes_value(true)
                .help("Restaura o estado da CPU antes de executar"),
        )
        .arg(
            Arg::with_name("save-state")
                .long("save-state")
                .takes_value(true)
                .help("Salva o estado da CPU ao final"),
        )
}

fn raw_args<'a, 'b>(cmd: App<'a, 'b>) -> App<'a, 'b> {
    cmd.arg(
        Arg::with_name("base")
            .long("base")
            .takes_value(true)
            .default_value("0x80000000")
            .help("Endereço virtual onde o binário é carregado"),
    )
    .arg(
        Arg::with_name("entry")
            .long("entry")
            .short("e")
            .takes_value(true)
            .help("Endereço da primeira instrução (padrão: --base)"),
    )
}

fn load_raw(matches: &ArgMatches) -> Result<Image> {
    let bytes = fs::read(arg(matches, "file")?)?;
    let base = parse_addr(arg(matches, "base")?)?;
    let mut image = Image::from_raw(&bytes, base)?;
    if let Some(entry) = matches.value_of("entry") {
        image.entry = parse_addr(entry)?;
    }
    Ok(image)
}

fn load_elf(matches: &ArgMatches) -> Result<Image> {
    let bytes = fs::read(arg(matches, "file")?)?;
    Image::from_elf(&bytes)
}

/// Executa a imagem, opcionalmente com trace para `outfile`.
fn execute(image: Image, matches: &ArgMatches, outfile: Option<&str>) -> Result<()> {
    let config = Config {
        load_delay: !matches.is_present("no-load-delay"),
        reset_pc: image.entry,
    };
    let mut cpu = Cpu::new(image.ram, config);

    if let Some(path) = matches.value_of("load-state") {
        let data = fs::read(path).wrap_err_with(|| format!("reading {}", path))?;
        cpu.load_state(&data)?;
    }

    let reporter = match outfile {
        Some(path) => {
            let (handle, tx) = TraceReporter::new(File::create(path)?);
            cpu.attach_reporter(tx.clone());
            Some((handle, tx))
        }
        None => None,
    };

    cpu.stats_mut().start();
    if let Some(steps) = matches.value_of("steps") {
        let steps: u64 = steps.parse().wrap_err("invalid --steps")?;
        for _ in 0..steps {
            cpu.step();
        }
    } else {
        let budget: u64 = arg(matches, "budget")?.parse().wrap_err("invalid --budget")?;
        cpu.run(budget);
    }
    cpu.stats_mut().stop();

    if let Some((handle, tx)) = reporter {
        tx.send(TraceEvent::Finish)?;
        handle
            .join()
            .map_err(|_| eyre!("trace reporter thread panicked"))?;
    }

    if let Some(path) = matches.value_of("save-state") {
        fs::write(path, cpu.save_state()?).wrap_err_with(|| format!("writing {}", path))?;
    }

    println!("pc = {:#010x}", cpu.pc());
    for i in 1..32 {
        let val = cpu.reg(Register(i));
        if val != 0 {
            println!("{} = {:#018x}", Register(i), val);
        }
    }
    println!();
    print!("{}", cpu.stats());
    Ok(())
}

fn disassemble(words: impl Iterator<Item = u32>, base: u64, entry: Option<u64>) {
    let mut addr = base;
    for word in words {
        print!("{:#010x}:\t{:08x}\t{}", addr, word, Instruction::decode(word));
        if Some(addr) == entry {
            println!(" # <- entry");
        } else {
            println!();
        }
        addr += 4;
    }
}

fn decode_elf(matches: &ArgMatches) -> Result<()> {
    let bytes = fs::read(arg(matches, "file")?)?;
    let elf = Elf::parse(&bytes).wrap_err("elf: parse failed")?;

    // Só desmonte as seções que vão ser carregadas na memória
    for section in &elf.section_headers {
        if section.sh_type != goblin::elf::section_header::SHT_PROGBITS
            || section.sh_flags & goblin::elf::section_header::SHF_ALLOC as u64 == 0
        {
            continue;
        }
        println!("Disassembly of section {}:", &elf.shdr_strtab[section.sh_name]);

        let start = section.sh_offset as usize;
        let end = start + section.sh_size as usize;
        let data = bytes
            .get(start..end)
            .ok_or_else(|| eyre!("elf: section at {:#x} runs past the file", start))?;
        disassemble(words(data), section.sh_addr, Some(elf.entry));
        println!();
    }

    Ok(())
}

fn main() -> Result<()> {
    color_eyre::install()?;
    env_logger::init();

    // Aqui é descrito o CLI do emulador.
    // Não vou comentar porque a API do clap é bem auto-descritiva
    let matches = App::new("vr4300")
        .version(crate_version!())
        .author("Edu Renesto, eduardo.renesto@aluno.ufabc.edu.br")
        .subcommand(raw_args(
            SubCommand::with_name("decode")
                .about("Desconstrói o binário, mostrando o código Assembly equivalente")
                .arg(Arg::with_name("file").index(1).required(true)),
        ))
        .subcommand(
            SubCommand::with_name("decodeelf")
                .about("Carrega um arquivo ELF e o desconstrói")
                .arg(Arg::with_name("file").index(1).required(true)),
        )
        .subcommand(raw_args(run_args(
            SubCommand::with_name("run").about("Carrega o binário e o executa"),
        )))
        .subcommand(run_args(
            SubCommand::with_name("runelf").about("Carrega um arquivo ELF e o executa"),
        ))
        .subcommand(
            raw_args(run_args(SubCommand::with_name("trace").about(
                "Carrega o binário e o executa, escrevendo cada instrução no arquivo.",
            )))
            .arg(
                Arg::with_name("outfile")
                    .long("outfile")
                    .short("o")
                    .takes_value(true)
                    .default_value("vr4300.trace")
                    .help("Arquivo onde escrever o trace"),
            ),
        )
        .get_matches();

    match matches.subcommand() {
        ("decode", Some(m)) => {
            let bytes = fs::read(arg(m, "file")?)?;
            let base = parse_addr(arg(m, "base")?)?;
            let entry = m.value_of("entry").map(parse_addr).transpose()?;
            disassemble(words(&bytes), base as u64, entry.map(u64::from));
            Ok(())
        }
        ("decodeelf", Some(m)) => decode_elf(m),
        ("run", Some(m)) => execute(load_raw(m)?, m, None),
        ("runelf", Some(m)) => execute(load_elf(m)?, m, None),
        ("trace", Some(m)) => {
            let outfile = arg(m, "outfile")?;
            execute(load_raw(m)?, m, Some(outfile))
        }
        _ => {
            eprintln!("{}", matches.usage());
            Ok(())
        }
    }
}
