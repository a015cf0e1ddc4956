// src/dispatch/prompt.rs

use std::path::PathBuf;

/// Build the prompt sent to the generator for one run.
///
/// The body is passed through verbatim, including earlier run records and
/// any feedback the human wrote between them. `iteration` is the number of
/// the run about to happen; from the second run on a note asks the generator
/// to build on the previous output.
pub fn build_prompt(name: &str, access_paths: &[PathBuf], iteration: u64, body: &str) -> String {
    let mut sections = Vec::with_capacity(3);

    let boundary = access_paths
        .iter()
        .map(|path| format!("- {}", path.display()))
        .collect::<Vec<_>>()
        .join("\n");

    sections.push(format!(
        "You are {name}. Execute the following task. \
         Write your full output in well-structured markdown.\n\n\
         Your previous responses appear in quote callouts (lines starting with `>`). \
         The human's messages are the plain text outside those callouts. \
         Do not wrap your answer in a callout yourself; that is done for you.\n\n\
         You may only access files within these directories:\n\
         {boundary}\n\
         Do not read, write, or execute anything outside these paths."
    ));

    if iteration > 1 {
        sections.push(format!(
            "This is iteration {iteration}. The document below contains your earlier \
             output and possibly notes from the reviewer. Address the feedback and \
             build on the previous work."
        ));
    }

    sections.push(body.trim().to_string());
    sections.join("\n\n")
}
