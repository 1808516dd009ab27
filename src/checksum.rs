use bytes::Buf;

/// Fold the high half of `sum` into the low 16 bits until nothing is left above them.
const fn fold(mut sum: u64) -> u16 {
    while sum > 0xffff {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    sum as u16
}

/// Ones' complement sum of `data` as 16-bit network-order words, before the final complement.
///
/// A trailing odd byte is padded with a zero on the right. The result can be written back
/// with `put_u16`.
pub fn data(data: &[u8]) -> u16 {
    let mut words = data.chunks_exact(2);
    let mut sum: u64 = words
        .by_ref()
        .map(|mut word| u64::from(word.get_u16()))
        .sum();

    if let [last] = words.remainder() {
        sum += u64::from(*last) << 8;
    }

    fold(sum)
}

/// The Internet checksum of `data`: ones' complement of the ones' complement sum.
///
/// An empty buffer yields `0xffff`. A buffer that already carries its correct
/// checksum yields `0`.
pub fn checksum16(buffer: &[u8]) -> u16 {
    !data(buffer)
}
