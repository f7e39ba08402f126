use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Filename is {0} bytes, maximum is 255")]
    NameTooLong(usize),

    #[error("Record stream truncated mid-record")]
    Truncated,

    #[error("Filename is not valid UTF-8")]
    InvalidName,

    #[error("modinfo must be a single 'return {{ ... }}' block")]
    ModinfoShape,

    #[error("Invalid modinfo entry: {0}")]
    ModinfoEntry(String),
}
