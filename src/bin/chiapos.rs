//! Command-line driver for plotting, proving, and verifying.

use std::env;
use std::process::ExitCode;

use chiapos::prover::Prover;
use chiapos::utils::{decode_hex_n, encode_hex};
use chiapos::verifier::{quality_string, verify_proof};
use chiapos::{Plotter, PlotterConfig};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<(), String> {
    match args.get(1).map(String::as_str) {
        Some("generate") => generate(&args[2..]),
        Some("prove") => prove(&args[2..]),
        Some("verify") => verify(&args[2..]),
        Some("check") => check(&args[2..]),
        _ => {
            print_usage();
            Err("missing or unknown subcommand".to_string())
        }
    }
}

fn print_usage() {
    eprintln!("usage:");
    eprintln!("  chiapos generate <k> <seed-hex64> <output-path>");
    eprintln!("  chiapos prove <plot-path> <challenge-hex64>");
    eprintln!("  chiapos verify <k> <seed-hex64> <challenge-hex64> <proof-hex>");
    eprintln!("  chiapos check <plot-path> [count]");
}

fn generate(args: &[String]) -> Result<(), String> {
    let [k, seed_hex, path] = args else {
        return Err("generate requires: <k> <seed-hex64> <output-path>".to_string());
    };
    let k: u8 = k.parse().map_err(|_| "k must be an integer".to_string())?;
    let seed = decode_hex_n::<32>(seed_hex).map_err(|e| e.to_string())?;

    let config = PlotterConfig {
        k,
        seed,
        memo: Vec::new(),
    };
    let plotter = Plotter::new(config).map_err(|e| e.to_string())?;
    plotter.create_plot_file(path).map_err(|e| e.to_string())?;
    println!("wrote {path}");
    Ok(())
}

fn prove(args: &[String]) -> Result<(), String> {
    let [path, challenge_hex] = args else {
        return Err("prove requires: <plot-path> <challenge-hex64>".to_string());
    };
    let challenge = decode_hex_n::<32>(challenge_hex).map_err(|e| e.to_string())?;

    let prover = Prover::open(path).map_err(|e| e.to_string())?;
    let positions = prover.qualifying_positions(&challenge).map_err(|e| e.to_string())?;
    if positions.is_empty() {
        println!("no proof for this challenge");
        return Ok(());
    }
    for pos in positions {
        let proof = prover.full_proof(pos).map_err(|e| e.to_string())?;
        println!("{}", encode_proof(&proof));
    }
    Ok(())
}

fn verify(args: &[String]) -> Result<(), String> {
    let [k, seed_hex, challenge_hex, proof_hex] = args else {
        return Err("verify requires: <k> <seed-hex64> <challenge-hex64> <proof-hex>".to_string());
    };
    let k: u8 = k.parse().map_err(|_| "k must be an integer".to_string())?;
    let seed = decode_hex_n::<32>(seed_hex).map_err(|e| e.to_string())?;
    let challenge = decode_hex_n::<32>(challenge_hex).map_err(|e| e.to_string())?;
    let proof = decode_proof(proof_hex)?;

    let ok = verify_proof(&seed, k, &challenge, &proof).map_err(|e| e.to_string())?;
    if ok {
        let quality = quality_string(k, &challenge, &proof).map_err(|e| e.to_string())?;
        println!("valid, quality {}", encode_hex(&quality));
        Ok(())
    } else {
        Err("proof does not verify".to_string())
    }
}

fn check(args: &[String]) -> Result<(), String> {
    let path = args.first().ok_or("check requires: <plot-path> [count]")?;
    let count: usize = args
        .get(1)
        .map(|s| s.parse())
        .transpose()
        .map_err(|_| "count must be an integer".to_string())?
        .unwrap_or(1);

    let prover = Prover::open(path).map_err(|e| e.to_string())?;
    let seed = prover.seed();
    let k = prover.k();

    // Sweeps 16-bit challenge prefixes; each one that lands on a real
    // table-7 entry is proved and independently re-verified.
    let mut checked = 0usize;
    let mut valid = 0usize;
    for hi in 0..=u16::MAX {
        if checked >= count {
            break;
        }
        let mut challenge = [0u8; 32];
        challenge[0..2].copy_from_slice(&hi.to_be_bytes());

        let positions = prover.qualifying_positions(&challenge).map_err(|e| e.to_string())?;
        for pos in positions {
            if checked >= count {
                break;
            }
            checked += 1;
            let proof = prover.full_proof(pos).map_err(|e| e.to_string())?;
            if verify_proof(&seed, k, &challenge, &proof).map_err(|e| e.to_string())? {
                valid += 1;
            }
        }
    }
    println!("{valid}/{checked} proofs verified");
    if checked == 0 || valid != checked {
        return Err("one or more proofs failed verification".to_string());
    }
    Ok(())
}

fn encode_proof(xs: &[u64]) -> String {
    let bytes: Vec<u8> = xs.iter().flat_map(|x| x.to_le_bytes()).collect();
    encode_hex(&bytes)
}

fn decode_proof(s: &str) -> Result<Vec<u64>, String> {
    let bytes = chiapos::utils::decode_hex(s).map_err(|e| e.to_string())?;
    if bytes.len() % 8 != 0 {
        return Err("proof hex must be a multiple of 8 bytes".to_string());
    }
    Ok(bytes.chunks(8).map(|c| u64::from_le_bytes(c.try_into().unwrap())).collect())
}
