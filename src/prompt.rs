use anyhow::Result;
use std::io::{self, Write};
use zeroize::Zeroizing;

pub fn prompt_string(prompt: &str) -> Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut s = String::new();
    io::stdin().read_line(&mut s)?;
    if s.ends_with('\n') {
        s.pop();
        if s.ends_with('\r') {
            s.pop();
        }
    }
    Ok(s)
}

/// Read a secret without echoing it.
pub fn prompt_secret_hidden(prompt: &str) -> Result<Zeroizing<String>> {
    let secret = rpassword::prompt_password(prompt)?;
    Ok(Zeroizing::new(secret))
}
