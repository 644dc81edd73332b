//! Audio normalization stage: peak measurement, peak normalization, the
//! surround-to-stereo fold-down and the night-mode track variants.
//!
//! Every step is a single ffmpeg invocation built here and executed through
//! the [`ToolRunner`]. Normalization is verified by re-measuring the written
//! file; the measured peak must equal the target exactly.

use crate::config::{CoreConfig, DRC_RATIO, DownmixGains, FLAC_COMPRESSION_LEVEL};
use crate::error::{CoreError, CoreResult};
use crate::external::{ToolCommand, ToolRunner, probe_sample_rate};
use crate::jobs::{AudioCodec, TrackId};
use crate::temp_files::remove_if_exists;
use crate::utils::file_stem;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Intermediate written next to a night-mode output before normalization.
pub const PRENORM_FILE: &str = "prenorm.flac";

/// Peak reported when volumedetect prints no measurement.
const NO_PEAK_DB: f64 = 0.0;

const MAX_VOLUME_MARKER: &str = "max_volume:";

/// Processing applied to a generated stereo track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NightmodeVariant {
    /// Fold-down and peak normalization only
    DownmixOnly,
    /// Loudness normalization
    Loudnorm,
    /// Dynamic range compression followed by loudness normalization
    DrcLoudnorm,
}

impl NightmodeVariant {
    /// Label used in track titles.
    pub fn title_label(self) -> &'static str {
        match self {
            NightmodeVariant::DownmixOnly => "DownmixOnly",
            NightmodeVariant::Loudnorm => "Loudnorm",
            NightmodeVariant::DrcLoudnorm => "DRC+Loudnorm",
        }
    }

    /// Short tag used in file names.
    pub fn file_tag(self) -> &'static str {
        match self {
            NightmodeVariant::DownmixOnly => "downmix",
            NightmodeVariant::Loudnorm => "loudnorm",
            NightmodeVariant::DrcLoudnorm => "drc",
        }
    }

    /// Suffix appended to the input stem by [`create_nightmode_tracks`].
    fn standalone_suffix(self) -> &'static str {
        match self {
            NightmodeVariant::DownmixOnly => "-nightmode",
            NightmodeVariant::Loudnorm => "-nightmode-loudnorm",
            NightmodeVariant::DrcLoudnorm => "-nightmode-drc",
        }
    }

    fn loudnorm(self) -> bool {
        !matches!(self, NightmodeVariant::DownmixOnly)
    }

    fn drc(self) -> bool {
        matches!(self, NightmodeVariant::DrcLoudnorm)
    }
}

/// Settings of one [`nightmode_track`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct NightmodeOptions {
    pub codec: AudioCodec,
    pub loudnorm: bool,
    pub drc: bool,
    /// Fold the input down to stereo first; `None` for inputs already stereo
    pub downmix: Option<DownmixGains>,
    pub target_peak_db: f64,
    /// Sample rate of the intermediate; probed from the input when `None`
    pub sample_rate: Option<String>,
    pub aac_bitrate: String,
}

impl NightmodeOptions {
    /// Options producing `variant` from a surround input.
    pub fn for_variant(variant: NightmodeVariant, codec: AudioCodec, config: &CoreConfig) -> Self {
        Self {
            codec,
            loudnorm: variant.loudnorm(),
            drc: variant.drc(),
            downmix: Some(config.downmix),
            target_peak_db: config.target_peak_db,
            sample_rate: None,
            aac_bitrate: config.aac_bitrate.clone(),
        }
    }

    /// Filters applied before normalization, in order.
    pub fn filter_chain(&self) -> Vec<String> {
        let mut chain = Vec::new();
        if let Some(gains) = &self.downmix {
            chain.push(downmix_filter(gains));
        }
        if self.drc {
            chain.push(format!("acompressor=ratio={DRC_RATIO}"));
        }
        if self.loudnorm {
            chain.push("loudnorm".to_string());
        }
        chain
    }
}

/// Builds the stereo fold-down pan filter.
///
/// Center and LFE are split evenly across both sides, every other channel
/// feeds its own side at the surround gain.
pub fn downmix_filter(gains: &DownmixGains) -> String {
    let c = gains.center / 2.0;
    let l = gains.lfe / 2.0;
    let s = gains.surround;
    format!(
        "pan=stereo|FL={c}*FC+{s}*FL+{s}*FLC+{s}*BL+{s}*SL+{l}*LFE|FR={c}*FC+{s}*FR+{s}*FRC+{s}*BR+{s}*SR+{l}*LFE"
    )
}

/// Extracts the last `max_volume` value from volumedetect output.
pub fn parse_max_volume(lines: &[String]) -> Option<f64> {
    lines.iter().rev().find_map(|line| {
        let (_, value) = line.split_once(MAX_VOLUME_MARKER)?;
        value.trim().trim_end_matches("dB").trim().parse().ok()
    })
}

/// Measures the peak level of `file` in dB.
///
/// Returns `0.0` when ffmpeg reports no peak.
pub fn measure_peak<R: ToolRunner + ?Sized>(runner: &R, file: &Path) -> CoreResult<f64> {
    let mut cmd = ToolCommand::ffmpeg("volumedetect");
    cmd.arg("-i")
        .path(file)
        .args(["-acodec", "pcm_s16le", "-af", "volumedetect", "-f", "null", "-"]);

    let output = runner.run(&cmd)?;
    match parse_max_volume(&output.diagnostics) {
        Some(peak) => {
            log::debug!("Peak of {}: {} dB", file.display(), peak);
            Ok(peak)
        }
        None => {
            log::warn!("No peak reported for {}", file.display());
            Ok(NO_PEAK_DB)
        }
    }
}

/// Normalizes the peak of `input` to `target_db`, writing FLAC to `output`.
///
/// Returns `false` without writing anything when `input` is already at the
/// target (or reports no peak). The written file is re-measured and must
/// read exactly `target_db`.
pub fn normalize<R: ToolRunner + ?Sized>(
    runner: &R,
    input: &Path,
    output: &Path,
    target_db: f64,
) -> CoreResult<bool> {
    let peak = measure_peak(runner, input)?;
    if peak == NO_PEAK_DB || peak == target_db {
        log::info!("{} is already normalized", input.display());
        return Ok(false);
    }

    let gain = target_db - peak;
    log::info!("Adjusting volume of {} by {} dB", input.display(), gain);

    let mut cmd = ToolCommand::ffmpeg("normalize");
    cmd.args(["-y", "-i"])
        .path(input)
        .args(["-acodec", "flac", "-compression_level"])
        .arg(FLAC_COMPRESSION_LEVEL.to_string())
        .arg("-af")
        .arg(format!("volume={gain}dB"))
        .path(output);
    runner.run(&cmd)?;

    let verified = measure_peak(runner, output)?;
    if verified != target_db {
        log::error!(
            "Normalized peak of {} is {} dB, expected {} dB",
            output.display(),
            verified,
            target_db
        );
        return Err(CoreError::PeakMismatch {
            path: output.to_path_buf(),
            expected: target_db,
            actual: verified,
        });
    }
    log::info!("Normalize complete: {}", output.display());
    Ok(true)
}

/// Extracts stream `track` of `container` to FLAC.
pub fn extract_track<R: ToolRunner + ?Sized>(
    runner: &R,
    container: &Path,
    track: TrackId,
    output: &Path,
) -> CoreResult<()> {
    let mut cmd = ToolCommand::ffmpeg("extract");
    cmd.arg("-i")
        .path(container)
        .arg("-map")
        .arg(format!("0:{track}"))
        .args(["-acodec", "flac", "-y"])
        .path(output);
    runner.run(&cmd)?;
    Ok(())
}

/// Folds `input` down to a stereo FLAC without any other processing.
pub fn downmix_track<R: ToolRunner + ?Sized>(
    runner: &R,
    input: &Path,
    output: &Path,
    gains: &DownmixGains,
) -> CoreResult<()> {
    let mut cmd = ToolCommand::ffmpeg("downmix");
    cmd.arg("-i")
        .path(input)
        .args(["-acodec", "flac", "-compression_level"])
        .arg(FLAC_COMPRESSION_LEVEL.to_string())
        .arg("-af")
        .arg(downmix_filter(gains))
        .arg("-y")
        .path(output);
    runner.run(&cmd)?;
    Ok(())
}

/// Transcodes a FLAC file to AAC in an MP4 container.
pub fn encode_aac<R: ToolRunner + ?Sized>(
    runner: &R,
    flac: &Path,
    output: &Path,
    bitrate: &str,
) -> CoreResult<()> {
    log::info!("Converting {} to AAC", flac.display());
    let mut cmd = ToolCommand::ffmpeg("aac");
    cmd.arg("-i")
        .path(flac)
        .args(["-acodec", "aac", "-b:a", bitrate, "-movflags", "faststart", "-y"])
        .path(output);
    runner.run(&cmd)?;
    Ok(())
}

/// Produces one normalized night-mode track from `input`.
///
/// `output` names the final file; its extension is replaced by the codec's.
/// Returns the path actually written.
pub fn nightmode_track<R: ToolRunner + ?Sized>(
    runner: &R,
    input: &Path,
    output: &Path,
    options: &NightmodeOptions,
) -> CoreResult<PathBuf> {
    let flac_output = output.with_extension(AudioCodec::Flac.extension());
    let chain = options.filter_chain();

    if chain.is_empty() {
        if !normalize(runner, input, &flac_output, options.target_peak_db)? {
            fs::copy(input, &flac_output)?;
        }
    } else {
        let sample_rate = match &options.sample_rate {
            Some(rate) => rate.clone(),
            None => probe_sample_rate(runner, input)?,
        };
        let prenorm = output
            .parent()
            .map_or_else(|| PathBuf::from(PRENORM_FILE), |dir| dir.join(PRENORM_FILE));

        let mut cmd = ToolCommand::ffmpeg("filter");
        cmd.arg("-i")
            .path(input)
            .args(["-acodec", "flac", "-compression_level"])
            .arg(FLAC_COMPRESSION_LEVEL.to_string())
            .arg("-af")
            .arg(chain.join(","))
            .args(["-ar", sample_rate.as_str(), "-y"])
            .path(&prenorm);
        runner.run(&cmd)?;

        if normalize(runner, &prenorm, &flac_output, options.target_peak_db)? {
            remove_if_exists(&prenorm)?;
        } else {
            fs::rename(&prenorm, &flac_output)?;
        }
    }

    match options.codec {
        AudioCodec::Flac => Ok(flac_output),
        AudioCodec::Aac => {
            let aac_output = output.with_extension(AudioCodec::Aac.extension());
            encode_aac(runner, &flac_output, &aac_output, &options.aac_bitrate)?;
            remove_if_exists(&flac_output)?;
            Ok(aac_output)
        }
    }
}

/// Codecs written by [`create_nightmode_tracks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputCodecs {
    Only(AudioCodec),
    /// FLAC tracks plus an AAC copy of each
    Both,
}

impl OutputCodecs {
    /// Codec the variants are built in; the AAC copy of [`OutputCodecs::Both`]
    /// is encoded from the FLAC afterwards.
    fn primary(self) -> AudioCodec {
        match self {
            OutputCodecs::Only(codec) => codec,
            OutputCodecs::Both => AudioCodec::Flac,
        }
    }
}

impl From<AudioCodec> for OutputCodecs {
    fn from(codec: AudioCodec) -> Self {
        OutputCodecs::Only(codec)
    }
}

impl FromStr for OutputCodecs {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "both" => Ok(OutputCodecs::Both),
            other => other.parse::<AudioCodec>().map(OutputCodecs::Only).map_err(|_| {
                CoreError::Config(format!("unknown codec '{other}', expected flac, aac or both"))
            }),
        }
    }
}

impl fmt::Display for OutputCodecs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputCodecs::Only(codec) => write!(f, "{codec}"),
            OutputCodecs::Both => f.write_str("both"),
        }
    }
}

/// Builds the three night-mode variants of a standalone surround file.
///
/// The input is folded down once into `<stem>-downmix.flac` inside
/// `output_dir`; every variant is made from that stereo intermediate, which
/// is removed afterwards. The intermediate's sample rate is measured unless
/// `sample_rate` is given. Returns the written files in variant order, the
/// FLAC before its AAC copy when both codecs are requested.
pub fn create_nightmode_tracks<R: ToolRunner + ?Sized>(
    runner: &R,
    input: &Path,
    output_dir: &Path,
    codecs: OutputCodecs,
    sample_rate: Option<&str>,
    config: &CoreConfig,
) -> CoreResult<Vec<PathBuf>> {
    if !input.is_file() {
        return Err(CoreError::InputNotFound(input.to_path_buf()));
    }
    fs::create_dir_all(output_dir)?;

    let stem = file_stem(input);
    let downmix = output_dir.join(format!("{stem}-downmix.flac"));
    log::info!("Downmixing {} to stereo", input.display());
    downmix_track(runner, input, &downmix, &config.downmix)?;

    let sample_rate = match sample_rate {
        Some(rate) => rate.to_string(),
        None => probe_sample_rate(runner, &downmix)?,
    };
    let codec = codecs.primary();
    let mut written = Vec::new();
    for variant in [
        NightmodeVariant::DownmixOnly,
        NightmodeVariant::Loudnorm,
        NightmodeVariant::DrcLoudnorm,
    ] {
        log::info!("Creating '{}' track", variant.title_label());
        let options = NightmodeOptions {
            downmix: None,
            sample_rate: Some(sample_rate.clone()),
            ..NightmodeOptions::for_variant(variant, codec, config)
        };
        let output = output_dir.join(format!(
            "{stem}{}.{}",
            variant.standalone_suffix(),
            codec.extension()
        ));
        let track = nightmode_track(runner, &downmix, &output, &options)?;
        if codecs == OutputCodecs::Both {
            let aac = track.with_extension(AudioCodec::Aac.extension());
            encode_aac(runner, &track, &aac, &config.aac_bitrate)?;
            written.push(track);
            written.push(aac);
        } else {
            written.push(track);
        }
    }

    remove_if_exists(&downmix)?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_downmix_filter() {
        assert_eq!(
            downmix_filter(&DownmixGains::default()),
            "pan=stereo|FL=0.5*FC+0.707*FL+0.707*FLC+0.707*BL+0.707*SL+0.5*LFE\
             |FR=0.5*FC+0.707*FR+0.707*FRC+0.707*BR+0.707*SR+0.5*LFE"
        );
    }

    #[test]
    fn downmix_filter_is_deterministic() {
        let gains = DownmixGains {
            surround: 0.6,
            lfe: 0.6,
            center: 1.0,
        };
        assert_eq!(downmix_filter(&gains), downmix_filter(&gains));
        assert!(downmix_filter(&gains).contains("0.3*LFE"));
    }

    #[test]
    fn parses_last_max_volume_line() {
        let lines: Vec<String> = [
            "[Parsed_volumedetect_0 @ 0x55] mean_volume: -20.1 dB",
            "[Parsed_volumedetect_0 @ 0x55] max_volume: -3.2 dB",
            "[Parsed_volumedetect_0 @ 0x55] max_volume: -1.5 dB",
            "[Parsed_volumedetect_0 @ 0x55] histogram_1db: 12",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(parse_max_volume(&lines), Some(-1.5));
        assert_eq!(parse_max_volume(&lines[..1]), None);
    }

    #[test]
    fn filter_chain_order() {
        let config = CoreConfig::default();
        let options =
            NightmodeOptions::for_variant(NightmodeVariant::DrcLoudnorm, AudioCodec::Flac, &config);
        let chain = options.filter_chain();
        assert_eq!(chain.len(), 3);
        assert!(chain[0].starts_with("pan=stereo|"));
        assert_eq!(chain[1], "acompressor=ratio=4");
        assert_eq!(chain[2], "loudnorm");

        let options = NightmodeOptions {
            downmix: None,
            ..NightmodeOptions::for_variant(NightmodeVariant::DownmixOnly, AudioCodec::Aac, &config)
        };
        assert!(options.filter_chain().is_empty());
    }

    #[test]
    fn output_codecs_from_str() {
        assert_eq!(
            "flac".parse::<OutputCodecs>().unwrap(),
            OutputCodecs::Only(AudioCodec::Flac)
        );
        assert_eq!(
            "aac".parse::<OutputCodecs>().unwrap(),
            OutputCodecs::Only(AudioCodec::Aac)
        );
        assert_eq!("both".parse::<OutputCodecs>().unwrap(), OutputCodecs::Both);
        assert_eq!(OutputCodecs::Both.to_string(), "both");
        assert!(matches!(
            "mp3".parse::<OutputCodecs>(),
            Err(CoreError::Config(msg)) if msg.contains("flac, aac or both")
        ));
    }
}
