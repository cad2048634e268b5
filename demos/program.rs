use std::env;
use std::fs::{self, File};
use std::io::BufReader;

use dvdkit::Result;
use dvdkit::formats::bdf3::Bdf3Reader;
use dvdkit::formats::bhd5::{FormatVersion, HeaderIndex};

fn main() -> Result<()> {
    let mut args = env::args().skip(1);
    let (Some(bhd), Some(bdt), Some(hash)) = (args.next(), args.next(), args.next()) else {
        eprintln!("usage: program <archive.bhd> <archive.bdt> <name-hash-hex>");
        return Ok(());
    };
    let hash = u32::from_str_radix(hash.trim_start_matches("0x"), 16)
        .map_err(|_| dvdkit::Error::Parse("name hash must be hexadecimal"))?;

    let index = HeaderIndex::parse(&mut BufReader::new(File::open(bhd)?), FormatVersion::V3)?;
    println!(
        "{} buckets, {} files, salt {:?}",
        index.buckets.len(),
        index.file_count(),
        index.salt
    );

    let Some(entry) = index.lookup(hash) else {
        println!("no file with hash {hash:08X}");
        return Ok(());
    };

    let mut blob = Bdf3Reader::new(File::open(bdt)?)?;
    let bytes = blob.read_verified(entry)?;
    fs::write(format!("{hash:08X}.bin"), &bytes)?;
    println!("wrote {} bytes", bytes.len());

    Ok(())
}
