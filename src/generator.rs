//! Random input generator.

use std::io::{self, prelude::*};

use rand::Rng;

/// Writes `count` newline-terminated records of random lowercase ASCII letters. Record lengths are uniformly
/// distributed in `1..=max_len`.
///
/// # Arguments
/// * `writer` - Destination of the records
/// * `rng` - Random number generator
/// * `count` - Number of records
/// * `max_len` - Maximum record length
pub fn generate<W: Write, R: Rng>(writer: &mut W, rng: &mut R, count: usize, max_len: usize) -> io::Result<()> {
    if max_len == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "maximum record length must be positive",
        ));
    }

    let mut record = Vec::with_capacity(max_len + 1);
    for _ in 0..count {
        let len = rng.gen_range(1..=max_len);

        record.clear();
        record.extend((0..len).map(|_| rng.gen_range(b'a'..=b'z')));
        record.push(b'\n');
        writer.write_all(&record)?;
    }

    return Ok(());
}

#[cfg(test)]
mod test {
    use std::io;

    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rstest::*;

    use super::generate;

    #[rstest]
    #[case(0, 5)]
    #[case(1, 1)]
    #[case(100, 12)]
    fn test_generate(#[case] count: usize, #[case] max_len: usize) {
        let mut rng = StdRng::seed_from_u64(7);
        let mut buf = Vec::new();
        generate(&mut buf, &mut rng, count, max_len).unwrap();

        let records: Vec<&[u8]> = buf.split(|b| *b == b'\n').collect();
        // the trailing newline leaves an empty tail
        assert_eq!(records.len(), count + 1);
        assert!(records[count].is_empty());
        for record in &records[..count] {
            assert!((1..=max_len).contains(&record.len()));
            assert!(record.iter().all(u8::is_ascii_lowercase));
        }
    }

    #[test]
    fn test_zero_max_len() {
        let mut rng = StdRng::seed_from_u64(7);
        let err = generate(&mut io::sink(), &mut rng, 3, 0).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
