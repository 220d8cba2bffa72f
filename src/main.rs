//! pager – paginate an HTML fragment by height and export it to PDF.
//!
//! Usage:
//!   pager <input.html> [output-dir] (--height N | --manual) [--filename F]
//!         [--landscape] [--format a4] [--config props.json] [--emit-html]
//!
//! The PDF is written into `output-dir` (default: the current directory).

use std::sync::Arc;
use std::{env, fs, path::PathBuf, process};

use pdf_pager::{
    ComponentListener, Config, ForgeExporter, Html2Pdf, Orientation, PageFormat, TaffyMeasure,
};

/// Reports progress on stderr.
struct ProgressReporter;

impl ComponentListener for ProgressReporter {
    fn on_progress(&self, progress: u8) {
        eprintln!("[{progress:>3}%]");
    }

    fn on_has_paginated(&self) {
        log::debug!("content paginated");
    }
}

fn flag_value<'a>(iter: &mut impl Iterator<Item = &'a String>, flag: &str, prog: &str) -> String {
    match iter.next() {
        Some(v) => v.clone(),
        None => {
            eprintln!("Missing value for {flag}");
            print_usage(prog);
            process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let prog = args[0].as_str();

    let mut input_path: Option<PathBuf> = None;
    let mut output_dir: Option<PathBuf> = None;
    let mut height: Option<f32> = None;
    let mut manual = false;
    let mut filename: Option<String> = None;
    let mut landscape = false;
    let mut format: Option<String> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut emit_html = false;
    let mut positional = 0usize;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--height" => {
                let v = flag_value(&mut iter, arg, prog);
                match v.parse::<f32>() {
                    Ok(h) if h > 0.0 => height = Some(h),
                    _ => {
                        eprintln!("Invalid --height: {v}");
                        process::exit(1);
                    }
                }
            }
            "--manual" => manual = true,
            "--filename" | "-f" => filename = Some(flag_value(&mut iter, arg, prog)),
            "--landscape" | "-l" => landscape = true,
            "--format" => format = Some(flag_value(&mut iter, arg, prog)),
            "--config" | "-c" => config_path = Some(PathBuf::from(flag_value(&mut iter, arg, prog))),
            "--emit-html" => emit_html = true,
            "--help" | "-h" => {
                print_usage(prog);
                process::exit(0);
            }
            other if other.starts_with('-') => {
                eprintln!("Unknown flag: {other}");
                print_usage(prog);
                process::exit(1);
            }
            path => {
                match positional {
                    0 => input_path = Some(PathBuf::from(path)),
                    1 => output_dir = Some(PathBuf::from(path)),
                    _ => {
                        eprintln!("Unexpected argument: {path}");
                        print_usage(prog);
                        process::exit(1);
                    }
                }
                positional += 1;
            }
        }
    }

    let input = match input_path {
        Some(p) => p,
        None => {
            eprintln!("Error: no input file specified.");
            print_usage(prog);
            process::exit(1);
        }
    };

    let html = match fs::read_to_string(&input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading '{}': {e}", input.display());
            process::exit(1);
        }
    };

    let mut config = match &config_path {
        Some(path) => {
            let parsed = fs::read_to_string(path)
                .map_err(pdf_pager::Error::from)
                .and_then(|json| Config::from_json(&json));
            match parsed {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("Error loading config '{}': {e}", path.display());
                    process::exit(1);
                }
            }
        }
        None => Config::default(),
    };

    // Flags override the props file.
    if height.is_some() {
        config.paginate_elements_by_height = height;
    }
    if manual {
        config.manual_pagination = true;
    }
    if landscape {
        config.pdf_orientation = Orientation::Landscape;
    }
    if let Some(f) = format {
        config.pdf_format = PageFormat::Named(f);
    }
    config.filename = match filename {
        Some(f) => f.trim_end_matches(".pdf").to_string(),
        None if config_path.is_none() => input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output")
            .to_string(),
        None => config.filename,
    };

    let exporter = ForgeExporter::new(output_dir.unwrap_or_else(|| PathBuf::from(".")));
    let component = Html2Pdf::builder(exporter, TaffyMeasure::new())
        .config(config)
        .listener(Arc::new(ProgressReporter))
        .build();
    component.set_content_html(&html);

    match component.generate_pdf().await {
        Ok(report) => {
            if let Some(path) = &report.saved_to {
                let size = report.pdf.as_ref().map_or(0, |b| b.len());
                eprintln!(
                    "Wrote '{}' ({size} bytes, {} page break{} inserted)",
                    path.display(),
                    report.pagination.inserted,
                    if report.pagination.inserted == 1 { "" } else { "s" }
                );
            }
            if emit_html {
                println!("{}", component.render_html());
            }
        }
        Err(e) => {
            eprintln!("Error generating PDF: {e}");
            process::exit(1);
        }
    }
}

fn print_usage(prog: &str) {
    eprintln!("pager – paginate HTML by height and export it to PDF (pdf-pager)");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {prog} <input.html> [output-dir] (--height N | --manual) [options]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <input.html>      HTML fragment; its top-level elements are paginated");
    eprintln!("  [output-dir]      Directory the PDF is written to (default: .)");
    eprintln!();
    eprintln!("Flags:");
    eprintln!("  --height N        Page height threshold in px");
    eprintln!("  --manual          Keep the page breaks already present in the input");
    eprintln!("  --filename, -f    Output file name without .pdf (default: input stem)");
    eprintln!("  --landscape, -l   Landscape orientation");
    eprintln!("  --format NAME     Page format: a0-a6, b5, letter, legal, tabloid (default: a4)");
    eprintln!("  --config, -c      JSON props file (camelCase keys); flags override it");
    eprintln!("  --emit-html       Print the component markup after export");
    eprintln!("  --help            Print this message");
}
