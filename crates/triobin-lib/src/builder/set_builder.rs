//! K-mer set builder orchestration
//!
//! Builds one [`KmerSet`], or both parental sets at once, inside a rayon pool
//! sized by [`BuildConfiguration::num_threads`].

use crate::builder::config::{BuildConfiguration, ConfigError};
use crate::builder::parse::open_kmer_list;
use crate::kmer_set::{BuildError, KmerSet};
use anyhow::{Context, Result};
use rayon::ThreadPool;
use std::path::Path;
use tracing::info;

/// Builder for the haplotype k-mer sets
pub struct KmerSetBuilder {
    config: BuildConfiguration,
    pool: ThreadPool,
}

impl KmerSetBuilder {
    /// Create a new builder with the given configuration
    ///
    /// # Parallelism
    /// The number of threads is controlled by `config.num_threads`:
    /// - `0`: use all available CPU cores (rayon default)
    /// - `N`: use exactly N threads
    pub fn new(config: BuildConfiguration) -> Result<Self, ConfigError> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.num_threads)
            .build()
            .map_err(|e| ConfigError::ThreadPool(e.to_string()))?;
        Ok(Self { config, pool })
    }

    /// Number of worker threads in the pool
    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Build both haplotype sets concurrently
    pub fn build_pair<S>(
        &self,
        hap_a: &[(usize, S)],
        hap_b: &[(usize, S)],
    ) -> Result<(KmerSet, KmerSet), BuildError>
    where
        S: AsRef<[u8]> + Sync,
    {
        let (a, b) = self.join(
            || KmerSet::build_numbered(hap_a, &self.config),
            || KmerSet::build_numbered(hap_b, &self.config),
        );
        Ok((a?, b?))
    }

    /// Stream a k-mer list from disk into its set
    pub fn build_from_file<P: AsRef<Path>>(&self, path: P) -> Result<KmerSet> {
        let path = path.as_ref();
        let set = self.pool.install(|| self.read_set(path))?;
        info!("Read {} k-mers from {}", set.num_input_kmers(), path.display());
        Ok(set)
    }

    /// Stream both parental k-mer lists into their sets concurrently
    pub fn build_pair_from_files<P, Q>(&self, hap_a: P, hap_b: Q) -> Result<(KmerSet, KmerSet)>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let (hap_a, hap_b) = (hap_a.as_ref(), hap_b.as_ref());
        self.config.print();

        let (a, b) = self.join(|| self.read_set(hap_a), || self.read_set(hap_b));
        let a = a.context("Failed to build haplotype A set")?;
        let b = b.context("Failed to build haplotype B set")?;

        for (name, set, path) in [("A", &a, hap_a), ("B", &b, hap_b)] {
            info!("Read {} haplotype {} k-mers from {}", set.num_input_kmers(), name, path.display());
            info!(
                "Haplotype {}: {} distinct {}-mers ({} duplicates), {:.2} MB",
                name,
                set.len(),
                set.k(),
                set.num_duplicates(),
                set.num_bytes() as f64 / (1024.0 * 1024.0)
            );
        }

        Ok((a, b))
    }

    fn read_set(&self, path: &Path) -> Result<KmerSet> {
        let reader = open_kmer_list(path)?;
        KmerSet::from_reader(reader, &self.config)
            .with_context(|| format!("Failed to build k-mer set from {}", path.display()))
    }

    /// Run two jobs side by side on the builder's pool
    fn join<A, B, RA, RB>(&self, a: A, b: B) -> (RA, RB)
    where
        A: FnOnce() -> RA + Send,
        B: FnOnce() -> RB + Send,
        RA: Send,
        RB: Send,
    {
        self.pool.install(|| rayon::join(a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn numbered(kmers: &[&str]) -> Vec<(usize, String)> {
        kmers.iter().enumerate().map(|(i, s)| (i + 1, s.to_string())).collect()
    }

    #[test]
    fn test_builder_rejects_bad_config() {
        let config = BuildConfiguration { capacity_num: 2, capacity_den: 2, ..BuildConfiguration::default() };
        assert!(matches!(
            KmerSetBuilder::new(config),
            Err(ConfigError::CapacityFactor { num: 2, den: 2 })
        ));
    }

    #[test]
    fn test_builder_thread_count() {
        let builder = KmerSetBuilder::new(BuildConfiguration::with_threads(2)).unwrap();
        assert_eq!(builder.num_threads(), 2);
    }

    #[test]
    fn test_build_pair() {
        let builder = KmerSetBuilder::new(BuildConfiguration::with_threads(2)).unwrap();
        let (a, b) = builder
            .build_pair(&numbered(&["AAAAC", "AAACC"]), &numbered(&["GGGTA", "GGTTA", "GTTAC"]))
            .unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(b.len(), 3);
        assert!(a.contains("GTTTT"));
        assert!(b.contains("GTTAC"));
    }

    #[test]
    fn test_build_pair_reports_first_failure() {
        let builder = KmerSetBuilder::new(BuildConfiguration::with_threads(1)).unwrap();
        let err = builder
            .build_pair(&numbered(&["AAAAC"]), &numbered(&["GGGTA", "GGXTA"]))
            .unwrap_err();
        assert_eq!(err, BuildError::InvalidBase { line: 2, base: b'X', position: 2 });
    }

    #[test]
    fn test_build_pair_from_files() -> Result<()> {
        let mut file_a = NamedTempFile::new()?;
        writeln!(file_a, "ACGGG")?;
        writeln!(file_a, "CGGGC\r")?;
        writeln!(file_a)?;
        file_a.flush()?;
        let mut file_b = NamedTempFile::new()?;
        writeln!(file_b, "TTTTC")?;
        file_b.flush()?;

        let builder = KmerSetBuilder::new(BuildConfiguration::with_threads(2))?;
        let (a, b) = builder.build_pair_from_files(file_a.path(), file_b.path())?;
        assert_eq!(a.len(), 2);
        assert_eq!(b.len(), 1);
        assert!(a.contains("CGGGC"));
        assert!(b.contains("GAAAA"));
        Ok(())
    }

    #[test]
    fn test_build_pair_from_files_names_failing_haplotype() -> Result<()> {
        let mut file_a = NamedTempFile::new()?;
        writeln!(file_a, "ACGGG")?;
        file_a.flush()?;
        let mut file_b = NamedTempFile::new()?;
        writeln!(file_b, "TTTTC")?;
        writeln!(file_b)?;
        writeln!(file_b, "TTNTC")?;
        file_b.flush()?;

        let builder = KmerSetBuilder::new(BuildConfiguration::with_threads(2))?;
        let err = builder.build_pair_from_files(file_a.path(), file_b.path()).unwrap_err();
        assert_eq!(err.to_string(), "Failed to build haplotype B set");
        assert_eq!(
            err.downcast_ref::<BuildError>(),
            Some(&BuildError::InvalidBase { line: 3, base: b'N', position: 2 })
        );
        Ok(())
    }

    #[test]
    fn test_build_from_file_error_has_context() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "ACGT")?;
        writeln!(file, "ACG")?;
        file.flush()?;

        let builder = KmerSetBuilder::new(BuildConfiguration::with_threads(1))?;
        let err = builder.build_from_file(file.path()).unwrap_err();
        assert!(err.to_string().starts_with("Failed to build k-mer set"));
        let cause = err.downcast_ref::<BuildError>().unwrap();
        assert!(matches!(cause, BuildError::MalformedKmerInput(_)));
        Ok(())
    }
}
