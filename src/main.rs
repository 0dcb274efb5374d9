//! evoconv CLI - evolve convolution filter stacks against an image dataset.

use std::fs;
use std::io::{self, BufRead};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use evoconv::compute::Trainer;
use evoconv::io::{
    PngSnapshotSink, load_dataset, load_image, load_pool, save_kernel_png, save_png, save_pool,
};
use evoconv::schema::Settings;

const SETTINGS_PATH: &str = "settings.json";

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        eprintln!("Usage: {} [source_dir] [target_dir] [pool.json]", args[0]);
        eprintln!();
        eprintln!("Evolve a stack of convolution kernels so that source images");
        eprintln!("convolve into their targets.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  source_dir  Directory of input images (default: TestImgs)");
        eprintln!("  target_dir  Directory of target images (default: TargetImgs)");
        eprintln!("  pool.json   Optional saved elite pool to resume from");
        std::process::exit(1);
    }

    let source_dir = args.get(1).map(String::as_str).unwrap_or("TestImgs");
    let target_dir = args.get(2).map(String::as_str).unwrap_or("TargetImgs");

    let settings = load_settings();
    if let Err(e) = settings.validate() {
        eprintln!("Invalid settings: {}", e);
        std::process::exit(1);
    }

    println!(
        "Network: {} layers of {}x{} kernels",
        settings.node_layers, settings.nodes_per_layer, settings.nodes_per_layer
    );

    let dataset = match load_dataset(source_dir, target_dir) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Failed to load dataset: {}", e);
            std::process::exit(1);
        }
    };
    println!("Loaded {} training pairs", dataset.len());

    let mut trainer = Trainer::new(settings, dataset, Box::new(PngSnapshotSink::default()));

    if let Some(pool_path) = args.get(3) {
        match load_pool(pool_path) {
            Ok(pool) => {
                trainer.set_elite(pool);
                println!("Resuming from {} saved parents", trainer.elite().len());
            }
            Err(e) => eprintln!("Could not load pool {}: {}", pool_path, e),
        }
    }

    loop {
        println!("Training... press Enter to pause.");
        let watcher = spawn_pause_watcher(trainer.pause_handle());
        trainer.run();
        let _ = watcher.join();

        if !interrupt_menu(&mut trainer) {
            break;
        }
    }

    println!(
        "Stopped after {} iterations ({} generations).",
        trainer.state().iterations,
        trainer.state().generations
    );
}

/// Load `settings.json`, writing the defaults out when it is missing.
/// A corrupt file is reported and replaced by defaults in memory.
fn load_settings() -> Settings {
    match fs::read_to_string(SETTINGS_PATH) {
        Ok(text) => match serde_json::from_str(&text) {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("Corrupt {}: {}; using defaults", SETTINGS_PATH, e);
                Settings::default()
            }
        },
        Err(_) => {
            let settings = Settings::default();
            match serde_json::to_string_pretty(&settings) {
                Ok(json) => {
                    if let Err(e) = fs::write(SETTINGS_PATH, json) {
                        eprintln!("Could not write default {}: {}", SETTINGS_PATH, e);
                    }
                }
                Err(e) => eprintln!("Could not encode default settings: {}", e),
            }
            settings
        }
    }
}

/// Watch stdin for a single line and raise the pause flag. The trainer
/// observes the flag at its next iteration boundary.
fn spawn_pause_watcher(flag: Arc<AtomicBool>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut line = String::new();
        let _ = io::stdin().lock().read_line(&mut line);
        flag.store(true, Ordering::Relaxed);
    })
}

fn read_line() -> Option<String> {
    let mut line = String::new();
    let n = io::stdin().lock().read_line(&mut line).ok()?;
    if n == 0 {
        return None; // stdin closed
    }
    Some(line.trim().to_string())
}

fn prompt(text: &str) -> Option<String> {
    println!("{}", text);
    read_line()
}

/// Menu shown while training is paused. Returns false to quit.
fn interrupt_menu(trainer: &mut Trainer) -> bool {
    loop {
        println!();
        println!("## Training interrupted");
        println!("1. Evaluate an image with the current stack");
        println!("2. Save the elite pool");
        println!("3. Reset kernels to identity");
        println!("4. Anneal once at a chosen rate");
        println!("5. Dump kernel weights");
        println!("6. Set mutation rate");
        println!("0. Resume training");
        println!("q. Quit");

        let Some(choice) = read_line() else {
            return false;
        };

        match choice.as_str() {
            "1" => {
                let Some(path) = prompt("Image path to evaluate:") else {
                    continue;
                };
                match load_image(&path) {
                    Ok(img) => {
                        let output = trainer.apply_current(&img);
                        match save_png(&output, "tmpimg.png") {
                            Ok(()) => println!("Saved output to tmpimg.png"),
                            Err(e) => println!("Could not save output: {}", e),
                        }
                    }
                    Err(e) => println!("Could not load {}: {}", path, e),
                }
            }
            "2" => {
                let Some(path) = prompt("Save pool as:") else {
                    continue;
                };
                match save_pool(&path, trainer.elite()) {
                    Ok(()) => println!("Saved {} parents to {}", trainer.elite().len(), path),
                    Err(e) => println!("Could not save pool: {}", e),
                }
            }
            "3" => {
                trainer.reset_kernels();
                println!("Kernels reset to identity.");
            }
            "4" => {
                let Some(raw) = prompt("Anneal rate as a decimal:") else {
                    continue;
                };
                match raw.parse::<f32>() {
                    Ok(rate) if rate.is_finite() && rate >= 0.0 => {
                        trainer.anneal(rate);
                        println!("Annealed once at rate {}", rate);
                    }
                    _ => println!("Not a valid rate: {}", raw),
                }
            }
            "5" => {
                for (i, kernel) in trainer.kernels().layers.iter().enumerate() {
                    println!("Layer {}:", i);
                    for row in kernel.to_rows() {
                        let cells: Vec<String> = row.iter().map(|v| format!("{:.4}", v)).collect();
                        println!("  {}", cells.join(", "));
                    }
                    let path = format!("weights{}.png", i);
                    if let Err(e) = save_kernel_png(kernel, &path) {
                        println!("Could not save {}: {}", path, e);
                    }
                }
                println!("Saved weight images.");
            }
            "6" => {
                let Some(raw) = prompt("New mutation rate as a decimal:") else {
                    continue;
                };
                match raw.parse::<f32>() {
                    Ok(rate) if rate.is_finite() && rate >= 0.0 => {
                        trainer.set_mutation_rate(rate);
                        println!("Mutation rate set to {}", rate);
                    }
                    _ => println!("Not a valid rate: {}", raw),
                }
            }
            "0" => return true,
            "q" | "Q" => return false,
            other => println!("Unknown option: {}", other),
        }
    }
}
