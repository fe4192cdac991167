//! Files written to a deployed repository

use chrono::{Datelike, Utc};

use crate::repo::RepoFile;
use crate::utils::truncate_chars;

pub const APP_PATH: &str = "index.html";
pub const README_PATH: &str = "README.md";
pub const LICENSE_PATH: &str = "LICENSE";

/// Longest commit subject line
const MAX_COMMIT_LEN: usize = 72;

/// `Round {n}: {brief}` as a single line of at most 72 characters
pub fn commit_message(round: u32, brief: &str) -> String {
    let first_line = brief.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    let message = format!("Round {}: {}", round, first_line);
    let message = message.trim_end();
    if message.chars().count() <= MAX_COMMIT_LEN {
        return message.to_string();
    }
    let mut cut = truncate_chars(message, MAX_COMMIT_LEN - 3).trim_end().to_string();
    cut.push_str("...");
    cut
}

/// MIT license text
pub fn mit_license(holder: &str) -> String {
    format!(
        "MIT License\n\n\
         Copyright (c) {year} {holder}\n\n\
         Permission is hereby granted, free of charge, to any person obtaining a copy\n\
         of this software and associated documentation files (the \"Software\"), to deal\n\
         in the Software without restriction, including without limitation the rights\n\
         to use, copy, modify, merge, publish, distribute, sublicense, and/or sell\n\
         copies of the Software, and to permit persons to whom the Software is\n\
         furnished to do so, subject to the following conditions:\n\n\
         The above copyright notice and this permission notice shall be included in all\n\
         copies or substantial portions of the Software.\n\n\
         THE SOFTWARE IS PROVIDED \"AS IS\", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR\n\
         IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,\n\
         FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE\n\
         AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER\n\
         LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,\n\
         OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE\n\
         SOFTWARE.\n",
        year = Utc::now().year(),
        holder = holder,
    )
}

/// The file set for one round. The license is only written on creation.
pub fn round_files(app: String, readme: String, license_holder: Option<&str>) -> Vec<RepoFile> {
    let mut files = vec![RepoFile::new(APP_PATH, app), RepoFile::new(README_PATH, readme)];
    if let Some(holder) = license_holder {
        files.push(RepoFile::new(LICENSE_PATH, mit_license(holder)));
    }
    files
}
