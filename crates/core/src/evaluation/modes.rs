//! Communication-mode analysis (pipeline stage 3). Purely local — no LLM
//! call. Persisted artifact counts per mode are banded on mode-specific
//! thresholds, and the per-mode bands combine into one qualitative summary.

use std::collections::HashMap;

use crate::models::report::{EngagementBand, ModeAnalysis, ModeAssessment};
use crate::models::CommunicationMode;

/// Mode-specific banding. Audio's thresholds are the reference banding
/// (0 → none, 1–4 → present, 5–9 → good, ≥10 → excellent); chattier modes
/// need more artifacts to reach the same band.
fn band_for(mode: CommunicationMode, count: u32) -> EngagementBand {
    use CommunicationMode::*;
    use EngagementBand::*;
    if count == 0 {
        return None;
    }
    match mode {
        Text => match count {
            1..=4 => Low,
            5..=14 => Present,
            15..=29 => Good,
            _ => Excellent,
        },
        Audio => match count {
            1..=4 => Present,
            5..=9 => Good,
            _ => Excellent,
        },
        Whiteboard => match count {
            1..=2 => Low,
            3..=5 => Present,
            6..=9 => Good,
            _ => Excellent,
        },
        Video | Screen => match count {
            1..=2 => Present,
            3..=5 => Good,
            _ => Excellent,
        },
    }
}

fn none_label(mode: CommunicationMode) -> &'static str {
    match mode {
        CommunicationMode::Text => "no messages",
        CommunicationMode::Audio => "no recordings",
        CommunicationMode::Video => "no video clips",
        CommunicationMode::Whiteboard => "no snapshots",
        CommunicationMode::Screen => "no screen captures",
    }
}

fn artifact_noun(mode: CommunicationMode, count: u32) -> &'static str {
    let plural = count != 1;
    match (mode, plural) {
        (CommunicationMode::Text, false) => "message",
        (CommunicationMode::Text, true) => "messages",
        (CommunicationMode::Audio, false) => "recording",
        (CommunicationMode::Audio, true) => "recordings",
        (CommunicationMode::Video, false) => "video clip",
        (CommunicationMode::Video, true) => "video clips",
        (CommunicationMode::Whiteboard, false) => "snapshot",
        (CommunicationMode::Whiteboard, true) => "snapshots",
        (CommunicationMode::Screen, false) => "screen capture",
        (CommunicationMode::Screen, true) => "screen captures",
    }
}

fn band_adjective(band: EngagementBand) -> &'static str {
    match band {
        EngagementBand::None => "no",
        EngagementBand::Low => "light",
        EngagementBand::Present => "moderate",
        EngagementBand::Good => "good",
        EngagementBand::Excellent => "excellent",
    }
}

/// Assessment for one mode and its artifact count.
pub fn assess_mode(mode: CommunicationMode, count: u32) -> ModeAssessment {
    let band = band_for(mode, count);
    let assessment = if band == EngagementBand::None {
        none_label(mode).to_string()
    } else {
        format!(
            "{} {} engagement ({} {})",
            band_adjective(band),
            mode,
            count,
            artifact_noun(mode, count)
        )
    };
    ModeAssessment {
        mode,
        artifact_count: count,
        band,
        assessment,
    }
}

/// Stage 3: assess each enabled mode and summarize. Modes missing from the
/// count map are zero.
pub fn analyze_modes(
    enabled: &[CommunicationMode],
    counts: &HashMap<CommunicationMode, u32>,
) -> ModeAnalysis {
    let assessments: Vec<ModeAssessment> = enabled
        .iter()
        .map(|mode| assess_mode(*mode, counts.get(mode).copied().unwrap_or(0)))
        .collect();

    let strong_modes = assessments
        .iter()
        .filter(|a| a.band >= EngagementBand::Good)
        .count();

    let summary = match strong_modes {
        0 => "Limited multi-modal engagement: no communication mode saw sustained use.".to_string(),
        1 => "Developing multi-modal engagement: one communication mode saw sustained use."
            .to_string(),
        n => format!(
            "Strong multi-modal engagement: {n} communication modes saw sustained use."
        ),
    };

    ModeAnalysis {
        assessments,
        summary,
    }
}
