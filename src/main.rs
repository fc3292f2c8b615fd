use clap::{Parser, Subcommand};
use quill_compiler::{GenerateOptions, Pipeline, TagHelperDescriptor};
use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "quill")]
#[command(about = "Quill - markup templates with embedded C#")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate C# from .quill files
    Generate {
        /// Path to a .quill file or directory
        #[arg(required_unless_present = "stdin")]
        file: Option<PathBuf>,

        /// Read from stdin
        #[arg(long)]
        stdin: bool,

        /// Output as JSON with source mappings and diagnostics
        #[arg(long)]
        json: bool,

        /// Design-time mode (IDE-facing whitespace rules, no instrumentation)
        #[arg(long)]
        design_time: bool,

        /// Skip #line pragma emission
        #[arg(long)]
        no_pragmas: bool,

        /// Namespace for the generated classes
        #[arg(long, default_value = "Quill.Output")]
        namespace: String,

        /// JSON file with tag helper descriptors
        #[arg(long)]
        descriptors: Option<PathBuf>,
    },
    /// Parse files and print diagnostics without writing output
    Check {
        /// Path to a .quill file or directory
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate { file, stdin, json, design_time, no_pragmas, namespace, descriptors } => {
            let pipeline = build_pipeline(descriptors.as_deref());
            let options = GenerateOptions {
                namespace,
                design_time,
                emit_line_pragmas: !no_pragmas,
                ..GenerateOptions::default()
            };
            if stdin {
                generate_stdin(&pipeline, &options, json);
            } else if let Some(path) = file {
                generate_path(&pipeline, &options, &path);
            } else {
                eprintln!("Error: provide a file/directory or use --stdin");
                std::process::exit(1);
            }
        }
        Commands::Check { file } => check_path(&file),
    }
}

fn build_pipeline(descriptors: Option<&Path>) -> Pipeline {
    match descriptors {
        Some(path) => {
            let text = fs::read_to_string(path).unwrap_or_else(|err| {
                eprintln!("Error: cannot read {}: {}", path.display(), err);
                std::process::exit(1);
            });
            let set: Vec<TagHelperDescriptor> = serde_json::from_str(&text).unwrap_or_else(|err| {
                eprintln!("Error: invalid descriptor file {}: {}", path.display(), err);
                std::process::exit(1);
            });
            Pipeline::standard().with_descriptors(set)
        }
        None => Pipeline::standard(),
    }
}

fn generate_stdin(pipeline: &Pipeline, options: &GenerateOptions, json_output: bool) {
    let mut source = String::new();
    io::stdin().read_to_string(&mut source).expect("Failed to read stdin");

    match pipeline.compile(&source, options) {
        Ok(result) => {
            if json_output {
                println!("{}", serde_json::to_string(&result).unwrap());
            } else {
                print!("{}", result.code);
                for error in &result.errors {
                    eprint!("{}", error.render(&source, "<stdin>"));
                }
            }
        }
        Err(err) => {
            eprintln!("Error: {}", err);
            std::process::exit(1);
        }
    }
}

fn generate_path(pipeline: &Pipeline, options: &GenerateOptions, path: &PathBuf) {
    if path.is_file() {
        if path.extension().map_or(true, |ext| ext != "quill") {
            eprintln!("Error: {} is not a .quill file", path.display());
            std::process::exit(1);
        }
        let start = Instant::now();
        generate_file(pipeline, options, path);
        print_summary(1, start.elapsed());
    } else if path.is_dir() {
        generate_directory(pipeline, options, path);
    } else {
        eprintln!("Error: {} does not exist", path.display());
        std::process::exit(1);
    }
}

fn generate_directory(pipeline: &Pipeline, options: &GenerateOptions, dir: &PathBuf) {
    let start = Instant::now();
    let mut file_count = 0;

    for entry in WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map_or(false, |ext| ext == "quill"))
    {
        generate_file(pipeline, options, entry.path());
        file_count += 1;
    }

    if file_count == 0 {
        eprintln!("No .quill files found in {}", dir.display());
        std::process::exit(1);
    }
    print_summary(file_count, start.elapsed());
}

fn generate_file(pipeline: &Pipeline, options: &GenerateOptions, path: &Path) {
    let source = fs::read_to_string(path).expect("Failed to read file");

    let class_name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Template")
        .to_string();

    let file_options = GenerateOptions {
        class_name,
        include_checksum: true,
        file_path: Some(path.display().to_string()),
        ..options.clone()
    };

    let result = match pipeline.compile(&source, &file_options) {
        Ok(result) => result,
        Err(err) => {
            eprintln!("Error: {}", err);
            std::process::exit(1);
        }
    };

    let is_tty = io::stderr().is_terminal();
    for error in &result.errors {
        let rendered = if is_tty {
            error.render_color(&source, &path.display().to_string())
        } else {
            error.render(&source, &path.display().to_string())
        };
        eprint!("{}", rendered);
    }

    let output = path.with_extension("cs");
    fs::write(&output, &result.code).expect("Failed to write file");
    print_generated(&output.display().to_string());
}

fn check_path(path: &PathBuf) {
    let files: Vec<PathBuf> = if path.is_file() {
        vec![path.clone()]
    } else if path.is_dir() {
        WalkDir::new(path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map_or(false, |ext| ext == "quill"))
            .map(|e| e.path().to_path_buf())
            .collect()
    } else {
        eprintln!("Error: {} does not exist", path.display());
        std::process::exit(1);
    };

    let pipeline = Pipeline::standard();
    let is_tty = io::stderr().is_terminal();
    let mut error_count = 0;

    for file in &files {
        let source = fs::read_to_string(file).expect("Failed to read file");
        let options = GenerateOptions {
            file_path: Some(file.display().to_string()),
            ..GenerateOptions::default()
        };
        if let Ok(result) = pipeline.compile(&source, &options) {
            error_count += result.errors.len();
            for error in &result.errors {
                let rendered = if is_tty {
                    error.render_color(&source, &file.display().to_string())
                } else {
                    error.render(&source, &file.display().to_string())
                };
                eprint!("{}", rendered);
            }
        }
    }

    if error_count > 0 {
        eprintln!("Found {} problem(s) in {} file(s)", error_count, files.len());
        std::process::exit(1);
    }
    eprintln!("Checked {} file(s), no problems", files.len());
}

fn print_generated(path: &str) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("  \x1b[32m✓\x1b[0m {}", path);
    } else {
        eprintln!("  ✓ {}", path);
    }
}

fn print_summary(count: usize, elapsed: std::time::Duration) {
    let is_tty = io::stderr().is_terminal();
    let time_str = format_duration(elapsed);
    let files_word = if count == 1 { "file" } else { "files" };

    if is_tty {
        eprintln!("\n\x1b[1m✨ Generated {} {} in {}\x1b[0m", count, files_word, time_str);
    } else {
        eprintln!("\n✨ Generated {} {} in {}", count, files_word, time_str);
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let micros = d.as_micros();
    if micros < 1000 {
        format!("{}μs", micros)
    } else if micros < 1_000_000 {
        format!("{:.1}ms", micros as f64 / 1000.0)
    } else {
        format!("{:.2}s", d.as_secs_f64())
    }
}
