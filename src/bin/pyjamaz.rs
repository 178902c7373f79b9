/*!
# Pyjamaz CLI
*/

use std::path::PathBuf;

use argyle::{Argue, FLAG_HELP, FLAG_REQUIRED, FLAG_VERSION};
use dowser::Dowser;
use pyjamaz::{CacheConfig, FormatTag, Metric, OptimizationRequest};

fn main() {
    match main__() {
        Ok(()) => {}
        Err(msg) => {
            eprintln!("Error: {msg}");
            std::process::exit(1);
        }
    }
}

fn main__() -> Result<(), String> {
    let args = Argue::new(FLAG_HELP | FLAG_VERSION | FLAG_REQUIRED)
        .map_err(|e| e.to_string())?;

    if args.take_help() {
        print!("{}", help());
        return Ok(());
    }
    if args.take_version() {
        println!("pyjamaz {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let max_bytes: u32 = args
        .option2_os("-b", "--max-bytes")
        .map(|v| v.to_string_lossy().parse())
        .transpose()
        .map_err(|_| "invalid --max-bytes".to_string())?
        .unwrap_or(0);
    let max_diff: f64 = args
        .option2_os("-d", "--max-diff")
        .map(|v| v.to_string_lossy().parse())
        .transpose()
        .map_err(|_| "invalid --max-diff".to_string())?
        .unwrap_or(0.0);
    let metric = match args.option2_os("-m", "--metric").map(|v| v.to_string_lossy().to_string()) {
        Some(ref s) if s.eq_ignore_ascii_case("ssimulacra2") => Metric::Ssimulacra2,
        Some(ref s) if s.eq_ignore_ascii_case("none") => Metric::None,
        _ => Metric::Dssim,
    };
    let concurrency: u32 = args
        .option2_os("-j", "--jobs")
        .map(|v| v.to_string_lossy().parse())
        .transpose()
        .map_err(|_| "invalid --jobs".to_string())?
        .unwrap_or_else(|| std::thread::available_parallelism().map_or(1, |n| n.get() as u32));
    let formats = parse_formats(args.option2_os("-f", "--formats"));
    let no_cache = args.switch("--no-cache");

    let paths: Vec<PathBuf> = Dowser::default()
        .with_paths(args.args_os())
        .into_vec_filtered(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref(),
                Some("jpg" | "jpeg" | "png" | "webp" | "avif")
            )
        });

    if paths.is_empty() {
        return Err("no image paths given".to_string());
    }

    for path in paths {
        if let Err(e) = optimize_one(&path, max_bytes, max_diff, metric, concurrency, &formats, no_cache) {
            eprintln!("{}: {e}", path.display());
        }
    }

    Ok(())
}

fn parse_formats(raw: Option<std::ffi::OsString>) -> Vec<FormatTag> {
    let Some(raw) = raw else {
        return FormatTag::ALL.to_vec();
    };
    raw.to_string_lossy()
        .split(',')
        .filter_map(|token| match token.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Some(FormatTag::Jpeg),
            "png" => Some(FormatTag::Png),
            "webp" => Some(FormatTag::WebP),
            "avif" => Some(FormatTag::Avif),
            _ => None,
        })
        .collect()
}

fn optimize_one(
    path: &std::path::Path,
    max_bytes: u32,
    max_diff: f64,
    metric: Metric,
    concurrency: u32,
    formats: &[FormatTag],
    no_cache: bool,
) -> Result<(), String> {
    let input = std::fs::read(path).map_err(|e| e.to_string())?;
    let request = OptimizationRequest {
        input,
        max_bytes,
        max_diff,
        metric,
        formats: if formats.is_empty() { FormatTag::ALL.to_vec() } else { formats.to_vec() },
        concurrency,
        flatten_color: [255, 255, 255],
        cache: if no_cache { None } else { Some(CacheConfig::default()) },
    };

    let result = pyjamaz::optimize(&request).map_err(|e| e.to_string())?;
    match result.selected {
        Some(candidate) => {
            let out_path = path.with_extension(candidate.format.extension());
            std::fs::write(&out_path, &candidate.bytes).map_err(|e| e.to_string())?;
            println!(
                "{}: {} bytes -> {} ({} bytes, diff {:.5})",
                path.display(),
                std::fs::metadata(path).map(|m| m.len()).unwrap_or(0),
                out_path.display(),
                candidate.byte_size(),
                candidate.diff
            );
            Ok(())
        }
        None => Err(format!("no candidate met the constraints ({:?})", result.rejection_reason)),
    }
}

const fn help() -> &'static str {
    concat!(
        "Pyjamaz ",
        env!("CARGO_PKG_VERSION"),
        "\n\n\
USAGE:\n\
    pyjamaz [OPTIONS] <PATH(S)...>\n\n\
OPTIONS:\n\
    -b, --max-bytes <NUM>     Byte-size budget (0 = unbounded).\n\
    -d, --max-diff <NUM>      Perceptual-diff ceiling (0 = unbounded).\n\
    -m, --metric <NAME>       dssim (default), ssimulacra2, or none.\n\
    -f, --formats <LIST>      Comma-separated subset of jpeg,png,webp,avif.\n\
    -j, --jobs <NUM>          Worker threads (default: available parallelism).\n\
        --no-cache            Disable the on-disk result cache.\n\
    -h, --help                Print this screen and exit.\n\
    -V, --version              Print version information and exit.\n",
    )
}
