use std::path::Path;

/// `"MC64000X"` read as a little-endian word.
pub const IMAGE_MAGIC: u64 = u64::from_le_bytes(*b"MC64000X");
pub const HEADER_SIZE: usize = 16;

#[derive(Debug)]
pub enum ImageError {
    Io(std::io::Error),
    TooShort(usize),
    BadMagic(u64),
}

impl std::fmt::Display for ImageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageError::Io(err) => write!(f, "failed to read image: {err}"),
            ImageError::TooShort(len) => {
                write!(f, "image too short: {len} bytes, header needs {HEADER_SIZE}")
            }
            ImageError::BadMagic(found) => {
                write!(f, "invalid image magic {found:#018x}, expected {IMAGE_MAGIC:#018x}")
            }
        }
    }
}

impl std::error::Error for ImageError {}

impl From<std::io::Error> for ImageError {
    fn from(err: std::io::Error) -> Self {
        ImageError::Io(err)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image {
    reserved: u64,
    code: Vec<u8>,
}

impl Image {
    pub fn from_code(code: Vec<u8>) -> Self {
        Self { reserved: 0, code }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ImageError> {
        if bytes.len() < HEADER_SIZE {
            return Err(ImageError::TooShort(bytes.len()));
        }
        let word = |at: usize| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes[at..at + 8]);
            u64::from_le_bytes(raw)
        };
        let magic = word(0);
        if magic != IMAGE_MAGIC {
            return Err(ImageError::BadMagic(magic));
        }
        Ok(Self {
            reserved: word(8),
            code: bytes[HEADER_SIZE..].to_vec(),
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ImageError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    pub fn reserved(&self) -> u64 {
        self.reserved
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn into_code(self) -> Vec<u8> {
        self.code
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE + self.code.len());
        out.extend_from_slice(&IMAGE_MAGIC.to_le_bytes());
        out.extend_from_slice(&self.reserved.to_le_bytes());
        out.extend_from_slice(&self.code);
        out
    }
}

pub fn encode_image(code: &[u8]) -> Vec<u8> {
    Image::from_code(code.to_vec()).to_bytes()
}
