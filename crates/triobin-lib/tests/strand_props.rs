use proptest::prelude::*;
use triobin_lib::encoding::reverse_complement_bytes;
use triobin_lib::{BuildConfiguration, KmerCodec, KmerSet, ReadClassifier};

fn dna(len: impl Into<proptest::collection::SizeRange>) -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(prop_oneof![Just(b'A'), Just(b'C'), Just(b'G'), Just(b'T')], len)
}

fn kmer_list() -> impl Strategy<Value = (usize, Vec<Vec<u8>>)> {
    (1usize..=32).prop_flat_map(|k| (Just(k), proptest::collection::vec(dna(k), 1..64)))
}

proptest! {
    #[test]
    fn canonical_is_strand_independent(kmer in dna(1..=32)) {
        let codec = KmerCodec::new(kmer.len()).expect("k in range");
        let rc = reverse_complement_bytes(&kmer).expect("valid DNA");
        prop_assert_eq!(codec.canonical(&kmer).unwrap(), codec.canonical(&rc).unwrap());
        prop_assert_eq!(
            codec.reverse_complement_key(codec.encode(&kmer).unwrap()),
            codec.encode(&rc).unwrap()
        );
        prop_assert_eq!(codec.decode(codec.encode(&kmer).unwrap()).into_bytes(), kmer);
    }

    #[test]
    fn every_built_kmer_is_a_member((_k, kmers) in kmer_list()) {
        let set = KmerSet::build(&kmers).expect("build succeeds");
        prop_assert!(set.len() <= kmers.len());
        prop_assert!(set.capacity() > set.len());
        for kmer in &kmers {
            prop_assert!(set.contains(kmer));
            let rc = reverse_complement_bytes(kmer).unwrap();
            prop_assert!(set.contains(&rc));
        }
    }

    #[test]
    fn absent_kmers_are_not_members((k, kmers) in kmer_list(), probe in dna(32)) {
        let probe = &probe[..k];
        let codec = KmerCodec::new(k).unwrap();
        let set = KmerSet::build(&kmers).unwrap();
        let present = kmers.iter().any(|s| codec.canonical(s).unwrap() == codec.canonical(probe).unwrap());
        prop_assert_eq!(set.contains(probe), present);
    }

    #[test]
    fn classification_is_strand_symmetric(
        (_k, kmers_a) in kmer_list(),
        kmers_b_seed in dna(32..512),
        read in dna(0..200),
    ) {
        let k = kmers_a[0].len();
        let kmers_b: Vec<&[u8]> = kmers_b_seed.chunks_exact(k).collect();
        prop_assume!(!kmers_b.is_empty());

        let hap_a = KmerSet::build(&kmers_a).unwrap();
        let hap_b = KmerSet::build(&kmers_b).unwrap();
        let classifier = ReadClassifier::new(&hap_a, &hap_b).unwrap();

        let rc = reverse_complement_bytes(&read).unwrap();
        prop_assert_eq!(classifier.classify(&read), classifier.classify(&rc));
    }

    #[test]
    fn rolling_keys_match_direct_encoding(read in dna(0..100), k in 1usize..=32) {
        let codec = KmerCodec::new(k).unwrap();
        let rolled: Vec<_> = codec.canonical_kmers(&read).collect();
        let direct: Vec<_> = read.windows(k).map(|w| codec.canonical(w).ok()).collect();
        prop_assert_eq!(rolled, direct);

        let config = BuildConfiguration { canonical: false, ..BuildConfiguration::default() };
        prop_assume!(read.len() >= k);
        let set = KmerSet::build_with_config(read.windows(k), &config).unwrap();
        prop_assert!(set.window_keys(&read).flatten().all(|key| set.contains_key(key)));
    }
}
