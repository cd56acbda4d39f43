pub type Result<T> = std::result::Result<T, String>;

pub fn handle_error_and_exit(err: String) -> ! {
    log::error!("{}", err);
    std::process::exit(1);
}

/// Maps an ASCII Phred+33 quality character to its Phred value.
pub fn phred_from_ascii(qual: u8) -> u8 {
    qual.saturating_sub(33)
}

/// Maps a Phred value back to its ASCII Phred+33 character.
pub fn ascii_from_phred(phred: u8) -> u8 {
    phred.saturating_add(33)
}
