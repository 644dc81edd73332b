//! ffprobe integration for stream listing.
//!
//! ffprobe is run through the [`ToolRunner`] like every other tool and its
//! JSON report is parsed with serde. Streams are exposed in two shapes: the
//! raw [`ProbedStream`] list (used to verify a remuxed container) and the
//! audio-only [`TrackDescriptor`] list used while planning jobs.

use super::command::{ToolCommand, ToolRunner};
use crate::error::{CoreError, CoreResult};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

const UNKNOWN: &str = "unknown";
const UNKNOWN_TITLE: &str = "Unknown";
const UNDETERMINED_LANGUAGE: &str = "und";

#[derive(Debug, Deserialize)]
struct ProbeReport {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    index: u32,
    codec_type: Option<String>,
    codec_name: Option<String>,
    channel_layout: Option<String>,
    sample_rate: Option<String>,
    sample_fmt: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

impl ProbeStream {
    // Matroska tags come through in whatever case the muxer wrote them.
    fn tag(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// One stream of a container as reported by ffprobe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbedStream {
    pub index: u32,
    pub codec_type: String,
    pub codec_name: String,
    pub channel_layout: Option<String>,
    pub sample_rate: Option<String>,
    pub sample_fmt: Option<String>,
    pub title: Option<String>,
    pub language: Option<String>,
}

impl ProbedStream {
    pub fn is_audio(&self) -> bool {
        self.codec_type == "audio"
    }

    pub fn is_video(&self) -> bool {
        self.codec_type == "video"
    }
}

impl fmt::Display for ProbedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} {}", self.index, self.codec_type, self.codec_name)?;
        if let Some(layout) = &self.channel_layout {
            write!(f, " {layout}")?;
        }
        if let Some(language) = &self.language {
            write!(f, " [{language}]")?;
        }
        if let Some(title) = &self.title {
            write!(f, " \"{title}\"")?;
        }
        Ok(())
    }
}

impl From<ProbeStream> for ProbedStream {
    fn from(stream: ProbeStream) -> Self {
        let title = stream.tag("title").map(str::to_string);
        let language = stream.tag("language").map(str::to_string);
        Self {
            index: stream.index,
            codec_type: stream.codec_type.unwrap_or_else(|| UNKNOWN.to_string()),
            codec_name: stream.codec_name.unwrap_or_else(|| UNKNOWN.to_string()),
            channel_layout: stream.channel_layout,
            sample_rate: stream.sample_rate,
            sample_fmt: stream.sample_fmt,
            title,
            language,
        }
    }
}

/// Audio stream summary shown to the operator while planning.
///
/// Two files with equal descriptor lists are planned together, so equality
/// covers every field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TrackDescriptor {
    pub index: u32,
    pub title: String,
    pub language: String,
    pub codec: String,
    pub channel_layout: String,
    pub sample_rate: String,
    pub sample_fmt: String,
}

impl From<&ProbedStream> for TrackDescriptor {
    fn from(stream: &ProbedStream) -> Self {
        let or_unknown = |value: &Option<String>| value.clone().unwrap_or_else(|| UNKNOWN.into());
        Self {
            index: stream.index,
            title: stream
                .title
                .clone()
                .unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            language: stream
                .language
                .clone()
                .unwrap_or_else(|| UNDETERMINED_LANGUAGE.to_string()),
            codec: stream.codec_name.clone(),
            channel_layout: or_unknown(&stream.channel_layout),
            sample_rate: or_unknown(&stream.sample_rate),
            sample_fmt: or_unknown(&stream.sample_fmt),
        }
    }
}

impl fmt::Display for TrackDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Track {}: {} [{}] {} {} {} Hz {}",
            self.index,
            self.title,
            self.language,
            self.codec,
            self.channel_layout,
            self.sample_rate,
            self.sample_fmt
        )
    }
}

/// Lists every stream of `path`.
pub fn probe_streams<R: ToolRunner + ?Sized>(
    runner: &R,
    path: &Path,
) -> CoreResult<Vec<ProbedStream>> {
    log::debug!("Probing streams of {}", path.display());
    let mut cmd = ToolCommand::ffprobe("streams");
    cmd.args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
        .path(path);

    let output = runner.run(&cmd)?;
    parse_probe_report(&output.stdout)
        .map_err(|e| CoreError::ProbeParse(format!("{}: {}", path.display(), e)))
}

/// Audio streams of `path` as planning descriptors, in stream order.
pub fn audio_track_descriptors<R: ToolRunner + ?Sized>(
    runner: &R,
    path: &Path,
) -> CoreResult<Vec<TrackDescriptor>> {
    let streams = probe_streams(runner, path)?;
    let descriptors: Vec<TrackDescriptor> = streams
        .iter()
        .filter(|s| s.is_audio())
        .map(TrackDescriptor::from)
        .collect();
    if descriptors.is_empty() {
        log::warn!("No audio streams found by ffprobe for {}", path.display());
    }
    Ok(descriptors)
}

/// Sample rate of the first stream of `path`, as ffprobe prints it.
pub fn probe_sample_rate<R: ToolRunner + ?Sized>(runner: &R, path: &Path) -> CoreResult<String> {
    let streams = probe_streams(runner, path)?;
    streams
        .into_iter()
        .next()
        .and_then(|s| s.sample_rate)
        .ok_or_else(|| {
            CoreError::ProbeParse(format!("{}: no sample rate reported", path.display()))
        })
}

fn parse_probe_report(json: &str) -> Result<Vec<ProbedStream>, serde_json::Error> {
    let report: ProbeReport = serde_json::from_str(json)?;
    Ok(report.streams.into_iter().map(ProbedStream::from).collect())
}
