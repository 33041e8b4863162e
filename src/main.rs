use clap::Parser;
use std::path::{Path, PathBuf};
use strata::{
    cli::{Cli, Commands, DumpFormat, GetFormat, ReportFormat},
    serialize, Config, Error, Schema, Value,
};

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Validate {
            files,
            schema,
            resolve,
            format,
            quiet,
        } => cmd_validate(&files, &schema, resolve, format, quiet),
        Commands::Dump {
            files,
            resolve,
            no_redact,
            format,
            output,
        } => cmd_dump(&files, resolve, no_redact, format, output.as_deref()),
        Commands::Get {
            args,
            resolve,
            format,
            default,
        } => cmd_get(&args, resolve, format, default.as_deref()),
        Commands::Check { files } => cmd_check(&files),
    };
    std::process::exit(code);
}

fn load_config(files: &[PathBuf]) -> Result<Config, Error> {
    if files.len() == 1 {
        Config::load(&files[0])
    } else {
        Config::load_merged(files)
    }
}

fn file_list(files: &[PathBuf]) -> String {
    files
        .iter()
        .map(|f| f.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn cmd_validate(
    files: &[PathBuf],
    schema_path: &Path,
    resolve: bool,
    format: ReportFormat,
    quiet: bool,
) -> i32 {
    let schema = match Schema::load(schema_path) {
        Ok(schema) => schema,
        Err(e) => {
            eprintln!("Failed to load schema {}: {e}", schema_path.display());
            return 2;
        }
    };
    let config = match load_config(files) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            return 2;
        }
    };

    let result = if resolve {
        config.validate(&schema)
    } else {
        config.validate_raw(&schema)
    };

    match result {
        Ok(()) => {
            if !quiet {
                match format {
                    ReportFormat::Json => println!("{{\"valid\": true}}"),
                    ReportFormat::Text => println!("✅ {} is valid", file_list(files)),
                }
            }
            0
        }
        Err(e) => {
            match format {
                ReportFormat::Json => {
                    let report = serde_json::json!({"valid": false, "error": e.to_string()});
                    match serde_json::to_string_pretty(&report) {
                        Ok(text) => println!("{text}"),
                        Err(e) => eprintln!("Failed to render report: {e}"),
                    }
                }
                ReportFormat::Text => {
                    eprintln!("❌ Validation failed\n");
                    eprintln!("{e}");
                }
            }
            1
        }
    }
}

fn cmd_dump(
    files: &[PathBuf],
    resolve: bool,
    no_redact: bool,
    format: DumpFormat,
    output: Option<&Path>,
) -> i32 {
    let config = match load_config(files) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            return 2;
        }
    };

    let redact = !no_redact;
    let rendered = match format {
        DumpFormat::Json => config.to_json(resolve, redact),
        DumpFormat::Yaml => config.to_yaml(resolve, redact),
    };
    let mut content = match rendered {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error: {e}");
            return 1;
        }
    };
    if !content.ends_with('\n') {
        content.push('\n');
    }

    match output {
        Some(path) => match std::fs::write(path, &content) {
            Ok(()) => {
                eprintln!("✅ Wrote to {}", path.display());
                0
            }
            Err(e) => {
                eprintln!("Error: failed to write {}: {e}", path.display());
                1
            }
        },
        None => {
            print!("{content}");
            0
        }
    }
}

fn cmd_get(args: &[String], resolve: bool, format: GetFormat, default: Option<&str>) -> i32 {
    // The positional list is FILE... PATH; clap keeps them together since
    // only the last positional may be variadic.
    if args.len() < 2 {
        eprintln!("Error: expected FILE... PATH");
        return 2;
    }
    let (files, path) = args.split_at(args.len() - 1);
    let files: Vec<PathBuf> = files.iter().map(PathBuf::from).collect();
    let path = &path[0];

    let config = match load_config(&files) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            return 2;
        }
    };

    let value = if resolve {
        config.get(path)
    } else {
        config.get_raw(path)
    };
    match value {
        Ok(value) => match print_value(&value, format) {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("Error: {e}");
                1
            }
        },
        Err(_) => match default {
            Some(text) => {
                println!("{text}");
                0
            }
            None => {
                eprintln!("Error: Path '{path}' not found");
                1
            }
        },
    }
}

fn print_value(value: &Value, format: GetFormat) -> Result<(), Error> {
    match format {
        GetFormat::Json => println!("{}", serialize::to_json_string(value)?),
        GetFormat::Yaml => print!("{}", serialize::to_yaml_string(value)?),
        GetFormat::Text => match value {
            Value::Null => println!("null"),
            Value::Sequence(_) | Value::Mapping(_) => {
                println!("{}", serialize::to_json_string(value)?)
            }
            scalar => println!("{scalar}"),
        },
    }
    Ok(())
}

fn cmd_check(files: &[PathBuf]) -> i32 {
    let mut all_valid = true;

    for file in files {
        let content = match std::fs::read_to_string(file) {
            Ok(content) => content,
            Err(e) => {
                eprintln!("❌ {}: {e}", file.display());
                all_valid = false;
                continue;
            }
        };
        let is_json = file
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let (result, label) = if is_json {
            (
                serde_json::from_str::<serde_json::Value>(&content)
                    .map(|_| ())
                    .map_err(|e| e.to_string()),
                "JSON",
            )
        } else {
            (
                Config::loads(&content, None).map(|_| ()).map_err(|e| e.to_string()),
                "YAML",
            )
        };
        match result {
            Ok(()) => println!("✅ {}: valid {label}", file.display()),
            Err(e) => {
                eprintln!("❌ {}: {e}", file.display());
                all_valid = false;
            }
        }
    }

    if all_valid {
        0
    } else {
        1
    }
}
