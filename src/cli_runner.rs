//! Command implementations behind the `batchstitch` binary.
//!
//! Everything here is a thin layer over [`SubmissionSession`] and the codec:
//! it gathers entries from the filesystem, runs the pipeline and writes the
//! results.

use crate::cli::{Args, Commands};
use crate::codec::ArchiveCodec;
use crate::common::{StudentBundle, UploadedEntry};
use crate::config::PipelineConfig;
use crate::context::{CancelFlag, ExtractionContext};
use crate::input::collect_entries;
use crate::language::detect_language_deep;
use crate::progress::{ProgressState, ProgressTracker};
use crate::root::get_root_index;
use crate::session::SubmissionSession;
use crate::upload::{format_file_size, RejectReason, UploadObserver, UploadSet};
use std::collections::HashMap;
use std::error::Error;
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{info, warn};

/// Runs the parsed command to completion.
pub async fn run_cli_app(args: Args) -> Result<(), Box<dyn Error>> {
    let config = Arc::new(PipelineConfig::load(args.config.as_deref())?);
    let ctx = ExtractionContext::new(Arc::clone(&config), ArchiveCodec::shared());

    match args.command {
        Commands::Stitch { inputs, output, language, progress } => {
            let entries = gather_entries(&inputs, &config)?;
            let language = language.as_deref().map(|code| config.language(code)).transpose()?;

            let cancel = CancelFlag::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupted, stopping after the current file");
                    on_interrupt.cancel();
                }
            });

            let mut ctx = ctx.with_cancel(cancel);
            if progress {
                let mut tracker = ProgressTracker::default();
                tracker.enable_with_callback(create_cli_progress_callback("stitch"));
                ctx = ctx.with_progress(Arc::new(tracker));
            }

            let session = SubmissionSession::new(ctx);
            let bundles = session.prepare(&entries, language).await?;
            let written = write_bundles(&bundles, &output)?;
            println!("Wrote {} student file(s) to {}", written, output.display());
        }
        Commands::Detect { inputs } => {
            let entries = collect_entries(&inputs)?;
            let language = detect_language_deep(&entries, &ctx).await?;
            let display =
                config.languages.get(&language).map(|l| l.display_name.as_str()).unwrap_or("");
            println!("{}\t{}", language, display);
        }
        Commands::List { archive } => {
            let name =
                archive.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            let entry = UploadedEntry::from_file(name, archive.clone());
            for member in ctx.codec().extract_files(&entry).await? {
                println!("{}", member.path());
            }
        }
        Commands::Classify { inputs } => {
            let entries = collect_entries(&inputs)?;
            let session = SubmissionSession::new(ctx);
            for unit in session.split(&entries).await? {
                let root = match get_root_index(&unit.entries, &config) {
                    Some(root) => root.to_string(),
                    None => "none".to_string(),
                };
                println!("{}\t{}\troot index: {}", unit.name, unit.kind, root);
            }
        }
    }

    Ok(())
}

/// Logs what the upload set refuses.
struct LogRejections;

impl UploadObserver for LogRejections {
    fn on_added(&mut self, entry: &UploadedEntry) {
        info!(file = entry.path(), "queued");
    }

    fn on_rejected(&mut self, name: &str, reason: &RejectReason) {
        warn!(file = name, "{}", reason);
    }
}

/// Collects entries from `inputs`. Files given directly go through an
/// [`UploadSet`] and must be archives; folder contents are taken as they are.
fn gather_entries(
    inputs: &[std::path::PathBuf],
    config: &PipelineConfig,
) -> Result<Vec<UploadedEntry>, Box<dyn Error>> {
    let mut uploads = UploadSet::from_config(config);
    uploads.subscribe(Box::new(LogRejections));

    let mut entries = Vec::new();
    for input in inputs {
        if input.is_file() {
            let size = std::fs::metadata(input).map(|m| m.len()).unwrap_or(0);
            info!(file = %input.display(), size = %format_file_size(size), "upload");
        }
        for entry in collect_entries(std::slice::from_ref(input))? {
            if entry.path().contains('/') || uploads.add(entry.clone()).is_ok() {
                entries.push(entry);
            }
        }
    }
    if entries.is_empty() {
        return Err("nothing to stitch: no archives or folders were given".into());
    }
    Ok(entries)
}

/// Writes one `<student>.txt` per bundle. A student emitted more than once
/// gets a numbered file for each later bundle.
fn write_bundles(bundles: &[StudentBundle], output: &Path) -> io::Result<usize> {
    std::fs::create_dir_all(output)?;
    let mut seen: HashMap<String, usize> = HashMap::new();
    for bundle in bundles {
        let stem = sanitize_filename(&bundle.student_key);
        let count = seen.entry(stem.clone()).or_insert(0);
        *count += 1;
        let file_name = if *count == 1 {
            format!("{}.txt", stem)
        } else {
            format!("{}-{}.txt", stem, count)
        };
        std::fs::write(output.join(&file_name), &bundle.stitched_text)?;
        info!(student = %bundle.student_key, file = %file_name, "written");
    }
    Ok(bundles.len())
}

/// Makes a student key safe to use as a file name on any platform.
fn sanitize_filename(name: &str) -> String {
    const FORBIDDEN_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

    let mut cleaned: String = name
        .chars()
        .map(|c| if c.is_control() || FORBIDDEN_CHARS.contains(&c) { '_' } else { c })
        .collect();

    while cleaned.ends_with('.') || cleaned.ends_with(' ') {
        cleaned.pop();
    }

    const RESERVED: [&str; 22] = [
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    if RESERVED.contains(&cleaned.to_ascii_uppercase().as_str()) {
        cleaned = format!("_{}", cleaned);
    }

    if cleaned.is_empty() {
        "student".to_string()
    } else {
        cleaned
    }
}

// --- utils for CLI progress -------------------------------------------------

fn create_cli_progress_callback(operation: &str) -> impl Fn(ProgressState) + Send + Sync + 'static {
    let operation = operation.to_uppercase();
    let last_update = Mutex::new(Instant::now());
    let prev_len = Mutex::new(0usize);
    let done = AtomicBool::new(false);

    move |state: ProgressState| {
        if done.load(Ordering::Relaxed) {
            return;
        }
        let now = Instant::now();
        // Redraw at most every 100ms, but always show completion
        let should_update = state.progress_percent >= 100.0
            || match last_update.lock() {
                Ok(mut last) if now.duration_since(*last).as_millis() >= 100 => {
                    *last = now;
                    true
                }
                _ => false,
            };
        if !should_update {
            return;
        }

        let term_width = term_size::dimensions().map(|(w, _)| w).unwrap_or(80);
        let eta = state.estimated_time_remaining().as_secs_f32();
        let eta_str = if state.processed_archives == 0 {
            "--".to_string()
        } else if eta > 60.0 {
            format!("{:.1}m", eta / 60.0)
        } else {
            format!("{:.1}s", eta)
        };

        let build_status_line = |bar_width: usize| -> String {
            let filled =
                (((state.progress_percent / 100.0) * bar_width as f32) as usize).min(bar_width);
            format!(
                "[{}] [{}{}] {:.1}% | {}/{} archives | {} students | ETA: {}",
                operation,
                "█".repeat(filled),
                "░".repeat(bar_width - filled),
                state.progress_percent,
                state.processed_archives,
                state.total_archives,
                state.students_emitted,
                eta_str
            )
        };

        let mut bar_width = 40;
        let mut line = build_status_line(bar_width);
        while line.chars().count() > term_width && bar_width > 10 {
            bar_width -= 4;
            line = build_status_line(bar_width);
        }

        if let Ok(mut prev) = prev_len.lock() {
            let len = line.chars().count();
            if *prev > len {
                line.push_str(&" ".repeat(*prev - len));
            }
            *prev = len;
        }
        eprint!("\r\x1B[2K{}", line);
        io::stderr().flush().ok();

        if state.progress_percent >= 100.0 {
            eprintln!();
            done.store(true, Ordering::Relaxed);
        }
    }
}
