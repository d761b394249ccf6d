use std::io::{self, BufRead, Write};

/// Answers accepted as a confirmation
const AFFIRMATIVE_ANSWERS: [&str; 4] = ["y", "yes", "o", "oui"];

/// General function to prompt for input with a specific message
pub fn prompt_for_input(prompt: &str) -> io::Result<String> {
    let stdin = io::stdin();
    prompt_from(prompt, &mut stdin.lock(), &mut io::stdout())
}

/// Prompt the operator for a yes/no answer, defaulting to "no"
pub fn prompt_for_confirmation(prompt: &str) -> io::Result<bool> {
    let answer = prompt_for_input(&format!("{prompt} [y/N]"))?;
    Ok(is_affirmative(&answer))
}

/// Whether the given answer confirms the action
pub fn is_affirmative(answer: &str) -> bool {
    let answer = answer.trim().to_lowercase();
    AFFIRMATIVE_ANSWERS.contains(&answer.as_str())
}

/// Write the prompt to `output` and read a single trimmed line from `input`
fn prompt_from<R: BufRead, W: Write>(
    prompt: &str,
    input: &mut R,
    output: &mut W,
) -> io::Result<String> {
    write!(output, "{}: ", prompt)?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;

    Ok(line.trim().to_string())
}
