use std::env;

#[derive(Debug, Clone)]
pub struct EscrowApiUrl(String);

impl AsRef<str> for EscrowApiUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl EscrowApiUrl {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self(base_url.into())
    }

    /// Creates a new EscrowApiUrl from the environment variable `ESCROW_API_URL`.
    pub fn from_env() -> Self {
        Self(env::var("ESCROW_API_URL").expect("ESCROW_API_URL must be set in env"))
    }

    /// Append the given path to the URL.
    pub fn append_path(&self, path: &str) -> Self {
        let trimmed_url = self.0.trim_end_matches('/');
        let trimmed_path = path.trim_start_matches('/');
        Self(format!("{}/{}", trimmed_url, trimmed_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_path_normalizes_slashes() {
        let url = EscrowApiUrl::new("https://pay.example.com/api/");
        assert_eq!(
            url.append_path("/escrow/authorize").as_ref(),
            "https://pay.example.com/api/escrow/authorize"
        );
    }
}
