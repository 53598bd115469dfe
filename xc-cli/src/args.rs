use anyhow::{Context, Result};
use birdcall::SpectrogramOverrides;
use clap::Args;
use std::path::PathBuf;
use xc_lib::SearchQuery;

/// Recording search filters.
#[derive(Args, Debug, Clone, Default)]
pub struct Filters {
    /// Scientific name, e.g. "Turdus migratorius"
    #[arg(short, long)]
    pub species: Option<String>,

    /// English common name
    #[arg(short, long)]
    pub common: Option<String>,

    /// Quality, e.g. A or ">C"
    #[arg(short, long)]
    pub quality: Option<String>,

    #[arg(long)]
    pub country: Option<String>,

    /// Only recordings uploaded since a date (YYYY-MM-DD) or within N days
    #[arg(long)]
    pub since: Option<String>,

    /// Extra search tag as key=value, repeatable
    #[arg(long = "tag", value_parser = parse_tag)]
    pub tags: Vec<(String, String)>,
}

impl Filters {
    pub fn to_query(&self) -> SearchQuery {
        let mut query = SearchQuery::new();
        if let Some(s) = &self.species {
            query = query.scientific_name(s);
        }
        if let Some(c) = &self.common {
            query = query.common_name(c);
        }
        if let Some(q) = &self.quality {
            query = query.quality(q);
        }
        if let Some(c) = &self.country {
            query = query.country(c);
        }
        if let Some(s) = &self.since {
            query = query.since(s);
        }
        for (k, v) in &self.tags {
            query = query.tag(k, v);
        }
        query
    }
}

fn parse_tag(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.trim().to_string())),
        _ => Err(format!("expected key=value, got {s:?}")),
    }
}

/// Spectrogram parameters. Flags override values from `--params`.
#[derive(Args, Debug, Clone, Default)]
pub struct ParamArgs {
    /// YAML file of parameter overrides
    #[arg(long)]
    pub params: Option<PathBuf>,

    #[arg(long)]
    pub n_fft: Option<usize>,

    #[arg(long)]
    pub hop_length: Option<usize>,

    #[arg(long)]
    pub n_mels: Option<usize>,

    #[arg(long)]
    pub fmin: Option<f64>,

    #[arg(long)]
    pub fmax: Option<f64>,

    /// Analysis sample rate in Hz
    #[arg(long)]
    pub sr: Option<u32>,

    #[arg(long)]
    pub dpi: Option<u32>,

    /// Figure size in inches as WIDTHxHEIGHT, e.g. 10x4
    #[arg(long, value_parser = parse_figsize)]
    pub figsize: Option<(f64, f64)>,
}

impl ParamArgs {
    pub fn overrides(&self) -> Result<SpectrogramOverrides> {
        let base = match &self.params {
            Some(path) => SpectrogramOverrides::from_yaml_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => SpectrogramOverrides::default(),
        };
        let flags = SpectrogramOverrides {
            n_fft: self.n_fft,
            hop_length: self.hop_length,
            n_mels: self.n_mels,
            fmin: self.fmin,
            fmax: self.fmax,
            sample_rate: self.sr,
            dpi: self.dpi,
            figure_size: self.figsize,
        };
        Ok(base.layered(&flags))
    }
}

fn parse_figsize(s: &str) -> Result<(f64, f64), String> {
    let (w, h) = s
        .split_once(['x', 'X', ','])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
    let w: f64 = w.trim().parse().map_err(|e| format!("bad width: {e}"))?;
    let h: f64 = h.trim().parse().map_err(|e| format!("bad height: {e}"))?;
    Ok((w, h))
}
