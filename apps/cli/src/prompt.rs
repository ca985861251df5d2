//! Line-based operator prompts.

use anyhow::{bail, Result};
use std::io::{BufRead, Write};

pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn out(&mut self) -> &mut W {
        &mut self.output
    }

    /// Trimmed answer to `question`. Fails when input is closed.
    pub fn ask(&mut self, question: &str) -> Result<String> {
        write!(self.output, "{question}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            bail!("input closed");
        }
        Ok(line.trim().to_string())
    }

    /// Number with a default for an empty answer; asks again on bad input.
    pub fn number(&mut self, label: &str, default: f64) -> Result<f64> {
        loop {
            let answer = self.ask(&format!("{label} [{default}]: "))?;
            if answer.is_empty() {
                return Ok(default);
            }
            match answer.parse::<f64>() {
                Ok(v) if v.is_finite() => return Ok(v),
                _ => writeln!(self.output, "'{answer}' is not a number")?,
            }
        }
    }

    /// Index of one of `options`, matched by number (1-based) or by name.
    /// An empty answer picks `default`.
    pub fn choose(&mut self, label: &str, options: &[&str], default: usize) -> Result<usize> {
        loop {
            writeln!(self.output, "{label}")?;
            for (i, option) in options.iter().enumerate() {
                writeln!(self.output, "  {}) {option}", i + 1)?;
            }
            let answer = self.ask(&format!("> [{}] ", default + 1))?;
            if answer.is_empty() {
                return Ok(default);
            }
            if let Ok(n) = answer.parse::<usize>() {
                if (1..=options.len()).contains(&n) {
                    return Ok(n - 1);
                }
            }
            if let Some(i) = options.iter().position(|o| o.eq_ignore_ascii_case(&answer)) {
                return Ok(i);
            }
            writeln!(self.output, "unknown choice '{answer}'")?;
        }
    }

    /// Index of a lettered menu entry: `a` is the first option.
    pub fn menu(&mut self, label: &str, options: &[&str]) -> Result<usize> {
        loop {
            writeln!(self.output, "{label}")?;
            for (letter, option) in ('a'..='z').zip(options) {
                writeln!(self.output, "  ({letter}) {option}")?;
            }
            let answer = self.ask("> ")?.to_ascii_lowercase();
            let mut chars = answer.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                let idx = (c as usize).wrapping_sub('a' as usize);
                if idx < options.len() {
                    return Ok(idx);
                }
            }
            writeln!(self.output, "unknown choice '{answer}'")?;
        }
    }

    pub fn confirm(&mut self, question: &str) -> Result<bool> {
        let answer = self.ask(&format!("{question} (y/n): "))?;
        Ok(matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompter(input: &str) -> Prompter<&[u8], Vec<u8>> {
        Prompter::new(input.as_bytes(), Vec::new())
    }

    #[test]
    fn number_uses_default_and_retries() {
        let mut p = prompter("\nabc\n2.5\n");
        assert_eq!(p.number("slope", 1.0).unwrap(), 1.0);
        assert_eq!(p.number("cost", 0.0).unwrap(), 2.5);
        let shown = String::from_utf8(p.out().clone()).unwrap();
        assert!(shown.contains("'abc' is not a number"));
    }

    #[test]
    fn choose_by_number_or_name() {
        let mut p = prompter("2\nHigh\n\n9\ncustom\n");
        let opts = ["high", "low", "custom"];
        assert_eq!(p.choose("preset", &opts, 0).unwrap(), 1);
        assert_eq!(p.choose("preset", &opts, 0).unwrap(), 0);
        assert_eq!(p.choose("preset", &opts, 2).unwrap(), 2);
        assert_eq!(p.choose("preset", &opts, 0).unwrap(), 2);
    }

    #[test]
    fn menu_takes_letters() {
        let mut p = prompter("B\nz\nsoft\ne\n");
        let opts = ["a", "b", "c", "d", "e"];
        assert_eq!(p.menu("next", &opts).unwrap(), 1);
        assert_eq!(p.menu("next", &opts).unwrap(), 4);
    }

    #[test]
    fn closed_input_is_an_error() {
        let mut p = prompter("");
        assert!(p.ask("? ").is_err());
        let mut p = prompter("Y\n");
        assert!(p.confirm("save").unwrap());
    }
}
