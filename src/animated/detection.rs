// SPDX-License-Identifier: MPL-2.0

//! File type detection for wallpaper media.
//!
//! Classification is by file extension only, checked case-insensitively.

use std::path::Path;

use neumowall_config::MediaKind;

/// Video container extensions played through the stream engine.
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4",  // MPEG-4 container (typically H.264/H.265 codec)
    "mov",  // QuickTime container (typically H.264)
    "avi",  // AVI container (legacy format)
    "mkv",  // Matroska container (any codec)
    "webm", // WebM container (VP8/VP9/AV1)
    "3gp",  // 3GPP container (mobile recordings)
    "flv",  // Flash Video container
];

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

/// Check if a path points to a GIF file.
#[must_use]
pub fn is_gif_file(path: &Path) -> bool {
    extension(path).is_some_and(|ext| ext == "gif")
}

/// Check if a path points to a video file.
#[must_use]
pub fn is_video_file(path: &Path) -> bool {
    extension(path).is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
}

/// The live wallpaper kind for `path`, if it is animated media.
#[must_use]
pub fn animated_kind(path: &Path) -> Option<MediaKind> {
    if is_video_file(path) {
        Some(MediaKind::Video)
    } else if is_gif_file(path) {
        Some(MediaKind::Gif)
    } else {
        None
    }
}
