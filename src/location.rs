// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Optional device geolocation, carried to the publish target as URL
// query parameters

use std::path::Path;
use tracing::{debug, info};

/// Read the two-line location metadata file: line 1 latitude, line 2
/// longitude, both floating point.
///
/// Any other line count or non-numeric content means "no metadata
/// available"; this never raises and never aborts startup.
pub fn read_location(path: impl AsRef<Path>) -> Option<(f64, f64)> {
    let content = match std::fs::read_to_string(path.as_ref()) {
        Ok(content) => content,
        Err(e) => {
            debug!(
                "No location metadata at {}: {}",
                path.as_ref().display(),
                e
            );
            return None;
        }
    };

    let lines: Vec<&str> = content.lines().collect();
    if lines.len() != 2 {
        debug!(
            "Location file {} has {} lines, expected 2; ignoring",
            path.as_ref().display(),
            lines.len()
        );
        return None;
    }

    let lat: f64 = lines[0].trim().parse().ok()?;
    let lon: f64 = lines[1].trim().parse().ok()?;

    info!("Location metadata: lat={}, lon={}", lat, lon);
    Some((lat, lon))
}

/// Append `lat`/`lon` query parameters to the publish URL when metadata
/// was read; return the base URL untouched otherwise.
pub fn publish_url(base: &str, location: Option<(f64, f64)>) -> String {
    match location {
        Some((lat, lon)) => {
            let separator = if base.contains('?') { '&' } else { '?' };
            format!("{}{}lat={}&lon={}", base, separator, lat, lon)
        }
        None => base.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn location_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_two_line_file_parses() {
        let file = location_file("51.5000\n-0.1200\n");
        assert_eq!(read_location(file.path()), Some((51.5, -0.12)));
    }

    #[test]
    fn test_one_line_file_is_no_metadata() {
        let file = location_file("51.5000\n");
        assert_eq!(read_location(file.path()), None);
    }

    #[test]
    fn test_three_line_file_is_no_metadata() {
        let file = location_file("51.5\n-0.12\n7.0\n");
        assert_eq!(read_location(file.path()), None);
    }

    #[test]
    fn test_non_numeric_content_is_no_metadata() {
        let file = location_file("fifty-one\n-0.12\n");
        assert_eq!(read_location(file.path()), None);
    }

    #[test]
    fn test_missing_file_is_no_metadata() {
        assert_eq!(read_location("/nonexistent/location.txt"), None);
    }

    #[test]
    fn test_url_without_location_unchanged() {
        assert_eq!(
            publish_url("rtsp://host:8554/stream", None),
            "rtsp://host:8554/stream"
        );
    }

    #[test]
    fn test_url_gains_query_parameters() {
        assert_eq!(
            publish_url("rtsp://host:8554/stream", Some((51.5, -0.12))),
            "rtsp://host:8554/stream?lat=51.5&lon=-0.12"
        );
    }

    #[test]
    fn test_url_with_existing_query_appends() {
        assert_eq!(
            publish_url("rtsp://host:8554/stream?auth=x", Some((51.5, -0.12))),
            "rtsp://host:8554/stream?auth=x&lat=51.5&lon=-0.12"
        );
    }
}
