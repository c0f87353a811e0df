//! EDN IR compiler CLI.

use ednc::commands::{check_file, emit_file, expand_file, parse_emit_options};

fn main() {
    ednc::init_tracing();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    let command = &args[1];

    match command.as_str() {
        "expand" => {
            if args.len() < 3 {
                eprintln!("Usage: ednc expand <file.edn>");
                std::process::exit(1);
            }
            expand_file(&args[2]);
        }
        "emit" => {
            let (path, options) = parse_emit_options(&args[2..]);
            let Some(path) = path else {
                eprintln!("Usage: ednc emit <file.edn> [options]");
                eprintln!();
                eprintln!("Options:");
                eprintln!("  --verify                 Run the LLVM verifier");
                eprintln!("  -o <path>                Output file (default: stdout)");
                print_emit_options();
                std::process::exit(1);
            };
            emit_file(&path, &options);
        }
        "check" => {
            let (path, options) = parse_emit_options(&args[2..]);
            let Some(path) = path else {
                eprintln!("Usage: ednc check <file.edn> [options]");
                eprintln!();
                eprintln!("Options:");
                print_emit_options();
                std::process::exit(1);
            };
            check_file(&path, &options);
        }
        "help" | "--help" | "-h" => {
            print_usage();
        }
        "version" | "--version" | "-V" => {
            println!("ednc {}", env!("CARGO_PKG_VERSION"));
        }
        _ => {
            eprintln!("Unknown command: {command}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_emit_options() {
    eprintln!("  --eh=<model>             Exception model: itanium, seh, both");
    eprintln!("  --panic=unwind           Unwind on panic instead of trapping");
    eprintln!("  --coro                   Emit coroutine intrinsics");
    eprintln!("  --target=<triple>        Target triple");
}

fn print_usage() {
    println!("ednc - the EDN IR compiler");
    println!();
    println!("Usage: ednc <command> [options]");
    println!();
    println!("Commands:");
    println!("  expand <file>     Print the module with sugar expanded");
    println!("  emit <file>       Emit LLVM IR (requires the llvm feature)");
    println!("  check <file>      Lint, emit and verify; report diagnostics");
    println!("  help              Show this help message");
    println!("  version           Show version information");
    println!();
    println!("Environment:");
    println!("  EDN_EH_MODEL=itanium|seh  Request an exception model");
    println!("  EDN_ENABLE_EH=1           Enable exception lowering");
    println!("  EDN_PANIC=unwind          Unwind on panic");
    println!("  EDN_ENABLE_CORO=1         Emit coroutine intrinsics");
    println!("  EDN_TARGET_TRIPLE=<t>     Target triple");
    println!("  RUST_LOG=<filter>         Trace emission (e.g. edn_emit=debug)");
}
