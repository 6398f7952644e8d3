use anyhow::{Context, Result, bail};
use debris_vision::{DirectorySink, EstimatorConfig, JobPool, JobRequest, Material, Photo, PhotoBatch};
use serde_json::{Map, Value};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const PHOTO_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "bmp"];
const MASK_SUFFIX: &str = "_mask";
const DEBUG_DIR: &str = "debug";

const USAGE: &str = "Usage: debris_tester <job_dir>... [--debug] [--regions] [--material NAME] [--compaction F] [--strict]";

struct Args {
    job_dirs: Vec<PathBuf>,
    config: EstimatorConfig,
}

fn env_flag(name: &str) -> bool {
    matches!(
        env::var(name).map(|v| v.to_ascii_lowercase()),
        Ok(v) if v == "1" || v == "true" || v == "yes"
    )
}

fn parse_material(name: &str) -> Result<Material> {
    Material::from_label(name).with_context(|| {
        let known: Vec<&str> = Material::ALL.iter().map(|m| m.label()).collect();
        format!("unknown material '{name}', expected one of: {}", known.join(", "))
    })
}

fn parse_compaction(value: &str) -> Result<f64> {
    let factor: f64 = value
        .parse()
        .with_context(|| format!("invalid compaction factor '{value}'"))?;
    if !factor.is_finite() || factor <= 0.0 {
        bail!("compaction factor must be positive, got {factor}");
    }
    Ok(factor)
}

/// Environment variables first, then command-line flags on top.
fn parse_args() -> Result<Args> {
    let mut config = EstimatorConfig {
        debug: env_flag("DV_DEBUG"),
        split_regions: env_flag("DV_REGIONS"),
        ..Default::default()
    };
    if let Ok(name) = env::var("DV_MATERIAL") {
        config.material = parse_material(&name).context("DV_MATERIAL")?;
    }
    if let Ok(value) = env::var("DV_COMPACTION") {
        config.compaction_override = Some(parse_compaction(&value).context("DV_COMPACTION")?);
    }

    let mut job_dirs = Vec::new();
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--debug" => config.debug = true,
            "--regions" => config.split_regions = true,
            "--strict" => config.allow_partial = false,
            "--material" => {
                let name = args.next().context("--material needs a value")?;
                config.material = parse_material(&name)?;
            }
            "--compaction" => {
                let value = args.next().context("--compaction needs a value")?;
                config.compaction_override = Some(parse_compaction(&value)?);
            }
            "-h" | "--help" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            flag if flag.starts_with("--") => bail!("unknown flag '{flag}'\n{USAGE}"),
            dir => job_dirs.push(PathBuf::from(dir)),
        }
    }

    if job_dirs.is_empty() {
        bail!("{USAGE}");
    }
    Ok(Args { job_dirs, config })
}

fn is_photo(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| PHOTO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Photos of a job directory in name order, each paired with `<stem>_mask.<ext>` when present.
fn load_job(dir: &Path) -> Result<PhotoBatch> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("reading job directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_photo(path))
        .collect();
    files.sort();

    let stem_of = |path: &Path| path.file_stem().and_then(|s| s.to_str()).map(str::to_string);

    let mut photos = Vec::new();
    for path in &files {
        let Some(stem) = stem_of(path) else {
            warn!(path = %path.display(), "skipping photo with a non UTF-8 name");
            continue;
        };
        if stem.ends_with(MASK_SUFFIX) {
            continue;
        }
        let mask_stem = format!("{stem}{MASK_SUFFIX}");
        let mask = files.iter().find(|p| stem_of(p).as_deref() == Some(mask_stem.as_str()));

        let mut photo = Photo::from_path(stem.clone(), path);
        if let Some(mask) = mask {
            photo = photo.with_mask(debris_vision::ImageSource::Path(mask.clone()));
        }
        photos.push(photo);
    }

    PhotoBatch::new(photos).with_context(|| format!("no photos found in {}", dir.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("debris_vision=info,debris_tester=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args()?;
    info!(
        jobs = args.job_dirs.len(),
        material = args.config.material.label(),
        compaction = args.config.compaction_factor(),
        debug = args.config.debug,
        "starting"
    );

    let mut requests = Vec::with_capacity(args.job_dirs.len());
    for dir in &args.job_dirs {
        let batch = load_job(dir)?;
        info!(job = %dir.display(), photos = batch.len(), "job loaded");
        let mut request = JobRequest::new(batch, args.config.clone());
        if args.config.debug {
            request = request.with_sink(Box::new(DirectorySink::new(dir.join(DEBUG_DIR))));
        }
        requests.push(request);
    }

    let pool = JobPool::new();
    let outcomes = pool.estimate_all(requests).await;

    let mut results = Map::new();
    for (dir, outcome) in args.job_dirs.iter().zip(outcomes) {
        let outcome = outcome.with_context(|| format!("estimating {}", dir.display()))?;
        results.insert(
            dir.display().to_string(),
            serde_json::to_value(&outcome.estimate).context("serializing estimate")?,
        );
    }

    println!("{}", serde_json::to_string_pretty(&Value::Object(results))?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use debris_vision::ImageSource;

    #[test]
    fn job_directory_pairs_masks_by_stem() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.JPG", "a_mask.png", "notes.txt", "c.webp"] {
            fs::write(dir.path().join(name), b"not decoded here").unwrap();
        }
        fs::create_dir(dir.path().join("debug")).unwrap();

        let batch = load_job(dir.path()).unwrap();
        let names: Vec<&str> = batch.photos().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a.JPG", "b.png", "c.webp"]);

        match &batch.photos()[0].mask {
            Some(ImageSource::Path(path)) => assert_eq!(path.file_name().unwrap(), "a_mask.png"),
            other => panic!("expected a mask path, got {other:?}"),
        }
        assert!(batch.photos()[1].mask.is_none());
        assert!(batch.photos()[2].mask.is_none());
    }

    #[test]
    fn directory_with_only_masks_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("x_mask.png"), b"").unwrap();
        assert!(load_job(dir.path()).is_err());
    }
}
