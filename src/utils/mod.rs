use anyhow::{Context, Result};
use std::path::Path;

/// Ensure directory exists
pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {:?}", path))?;
    }
    Ok(())
}

/// Format duration as human-readable string
pub fn format_duration(secs: f64) -> String {
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else if secs < 3600.0 {
        format!("{:.1}m", secs / 60.0)
    } else {
        format!("{:.1}h", secs / 3600.0)
    }
}

/// Random number utilities
pub mod random {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// Create RNG with fixed seed
    pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(seed)
    }
}

/// Validation utilities
pub mod validation {
    use anyhow::{bail, Result};

    /// Validate that value is in range
    pub fn in_range<T: PartialOrd + std::fmt::Display>(value: T, min: T, max: T, name: &str) -> Result<()> {
        if value < min || value > max {
            bail!("{} must be between {} and {}, got {}", name, min, max, value);
        }
        Ok(())
    }

    /// Validate that value is positive
    pub fn positive<T: PartialOrd + Default + std::fmt::Display>(value: T, name: &str) -> Result<()> {
        if value <= T::default() {
            bail!("{} must be positive, got {}", name, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30.0), "30.0s");
        assert_eq!(format_duration(90.0), "1.5m");
        assert_eq!(format_duration(3600.0), "1.0h");
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let mut a = random::seeded_rng(7);
        let mut b = random::seeded_rng(7);
        for _ in 0..5 {
            assert_eq!(a.gen::<u32>(), b.gen::<u32>());
        }
    }

    #[test]
    fn test_validation() {
        assert!(validation::in_range(0.5, 0.0, 1.0, "value").is_ok());
        assert!(validation::in_range(1.5, 0.0, 1.0, "value").is_err());

        assert!(validation::positive(1.0, "value").is_ok());
        assert!(validation::positive(0.0, "value").is_err());
    }

    #[test]
    fn test_ensure_dir() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let nested = temp_dir.path().join("models/nested");
        ensure_dir(&nested).unwrap();
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }
}
