//! Troubleshooting commands: `ang doctor`, `ang explain` and `ang api-diff`.

use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::Path;
use std::process;

use ang_analyze::{diff_openapi, explain, read_openapi, Doctor};

use super::print_json;
use crate::{report_error, OutputFormat};

/// Log text from `--log`, then stdin (explicit or piped), then the log
/// file. Blank sources fall through to the next one.
pub(crate) fn resolve_log(
    inline: Option<&str>,
    stdin: Option<&mut dyn Read>,
    log_file: &Path,
) -> Result<String, String> {
    if let Some(text) = inline.filter(|t| !t.trim().is_empty()) {
        return Ok(text.to_string());
    }
    if let Some(reader) = stdin {
        let mut buf = String::new();
        reader
            .read_to_string(&mut buf)
            .map_err(|e| format!("read stdin: {}", e))?;
        if !buf.trim().is_empty() {
            return Ok(buf);
        }
    }
    fs::read_to_string(log_file).map_err(|e| format!("cannot read {} ({})", log_file.display(), e))
}

pub(crate) fn cmd_doctor(log_file: &Path, inline: Option<&str>, from_stdin: bool, output: OutputFormat, quiet: bool) {
    let mut stdin = io::stdin();
    let inline_blank = inline.map_or(true, |t| t.trim().is_empty());
    let use_stdin = inline_blank && (from_stdin || !stdin.is_terminal());
    let reader: Option<&mut dyn Read> = if use_stdin { Some(&mut stdin) } else { None };
    let log = match resolve_log(inline, reader, log_file) {
        Ok(l) => l,
        Err(e) => {
            report_error(&format!("Doctor FAILED: {}", e), output, quiet);
            report_error("Provide --log, --stdin, or run with an existing ang-build.log", output, quiet);
            process::exit(1);
        }
    };
    let resp = Doctor::new(Path::new(".")).analyze(&log);
    print_json(&resp, output, quiet);
}

pub(crate) fn cmd_explain(code: Option<&str>, output: OutputFormat, quiet: bool) {
    let Some(code) = code.filter(|c| !c.trim().is_empty()) else {
        report_error("Usage: ang explain <CODE>", output, quiet);
        process::exit(1);
    };
    let Some(entry) = explain(code) else {
        report_error(
            &format!("Unknown code: {}", code.trim().to_uppercase()),
            output,
            quiet,
        );
        process::exit(1);
    };
    match output {
        OutputFormat::Json => print_json(&entry, output, quiet),
        OutputFormat::Text => println!("{}", entry.render()),
    }
}

fn api_diff_failed(msg: &str, output: OutputFormat, quiet: bool) -> ! {
    report_error(&format!("API diff FAILED: {}", msg), output, quiet);
    process::exit(1);
}

pub(crate) fn cmd_api_diff(base: &Path, current: &Path, write_base: bool, output: OutputFormat, quiet: bool) {
    if write_base {
        let data = fs::read(current).unwrap_or_else(|e| api_diff_failed(&format!("{}: {}", current.display(), e), output, quiet));
        if let Some(parent) = base.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = fs::create_dir_all(parent) {
                api_diff_failed(&format!("{}: {}", parent.display(), e), output, quiet);
            }
        }
        if let Err(e) = fs::write(base, data) {
            api_diff_failed(&format!("{}: {}", base.display(), e), output, quiet);
        }
        if !quiet {
            println!("Baseline written to {}", base.display());
        }
        return;
    }
    let base_doc = read_openapi(base).unwrap_or_else(|e| api_diff_failed(&e.to_string(), output, quiet));
    let current_doc = read_openapi(current).unwrap_or_else(|e| api_diff_failed(&e.to_string(), output, quiet));
    let report = diff_openapi(&base_doc, &current_doc);
    match output {
        OutputFormat::Json => print_json(&report, output, quiet),
        OutputFormat::Text => print!("{}", report.render()),
    }
}
