//! Prompt construction and output cleanup

use crate::models::request::Attachment;

/// Smallest output that can be a usable page
const MIN_OUTPUT_LEN: usize = 32;

/// Prompt for the app itself
pub fn app_prompt(
    brief: &str,
    checks: &[String],
    attachments: &[Attachment],
    prior_code: Option<&str>,
) -> String {
    let mut prompt = String::from(
        "You are an expert web developer. Create a single, complete HTML file for a web application.\n\n",
    );

    prompt.push_str("BRIEF:\n");
    prompt.push_str(brief.trim());
    prompt.push('\n');

    if !attachments.is_empty() {
        prompt.push_str("\nATTACHMENTS PROVIDED:\n");
        for att in attachments {
            prompt.push_str(&format!("- {}: {}\n", att.name, att.url));
        }
    }

    if !checks.is_empty() {
        prompt.push_str("\nCRITICAL - THESE JAVASCRIPT CHECKS MUST PASS:\n");
        for check in checks {
            prompt.push_str(&format!("- {}\n", check));
        }
    }

    if let Some(code) = prior_code {
        prompt.push_str(
            "\nCURRENT VERSION OF THE APP (revise it in place, keep working features unless the brief says otherwise):\n",
        );
        prompt.push_str(code);
        prompt.push('\n');
    }

    prompt.push_str(
        "\nREQUIREMENTS:\n\
         1. Return ONE complete HTML file with all CSS in <style> and all JavaScript in <script> tags\n\
         2. External files are not allowed except libraries loaded from a CDN\n\
         3. Every element id, class and behaviour referenced by the checks must exist\n\
         4. Load attachment data from the given URLs (they may be data: URLs)\n\
         5. Make the app functional, responsive and accessible\n\n\
         The checks are JavaScript expressions evaluated against the page.\n\n\
         OUTPUT FORMAT: return only the HTML, no explanations and no code fences. Start with <!DOCTYPE html>.",
    );

    prompt
}

/// Prompt for the repository README
pub fn readme_prompt(project: &str, brief: &str, is_update: bool) -> String {
    if is_update {
        format!(
            "Update the README.md for this GitHub repository with new features.\n\n\
             PROJECT: {project}\n\
             NEW FEATURES/UPDATES: {brief}\n\n\
             Include: project title and description, features (including the new ones), \
             a 'Recent Updates' section, setup, usage, a short code explanation and the MIT license.\n\
             Return only Markdown."
        )
    } else {
        format!(
            "Create a professional README.md for this GitHub repository.\n\n\
             PROJECT: {project}\n\
             DESCRIPTION: {brief}\n\n\
             Include: project title and description, features, setup, usage, \
             a short code explanation and the MIT license.\n\
             Return only Markdown."
        )
    }
}

/// README used when README generation fails
pub fn fallback_readme(project: &str, brief: &str, round: u32) -> String {
    format!(
        "# {project}\n\n{brief}\n\n## Usage\n\nOpen `index.html` in a browser or visit the GitHub Pages site for this repository.\n\n\
         ## History\n\nLast updated in round {round}.\n\n## License\n\nMIT\n",
        brief = brief.trim()
    )
}

/// Strip Markdown code fences and surrounding whitespace
pub fn clean_output(raw: &str) -> String {
    let mut code = raw;
    if let Some(idx) = code.find("```html") {
        code = &code[idx + "```html".len()..];
        if let Some(end) = code.find("```") {
            code = &code[..end];
        }
    } else if let Some(idx) = code.find("```") {
        code = &code[idx + 3..];
        // Drop an info string such as ```htm
        if let Some(nl) = code.find('\n') {
            if !code[..nl].contains('<') {
                code = &code[nl + 1..];
            }
        }
        if let Some(end) = code.find("```") {
            code = &code[..end];
        }
    }
    code.trim().to_string()
}

/// Whether cleaned output looks like an HTML document
pub fn looks_like_html(code: &str) -> bool {
    if code.len() < MIN_OUTPUT_LEN {
        return false;
    }
    let lower = code.to_ascii_lowercase();
    lower.contains("<html") || lower.contains("<!doctype")
}
