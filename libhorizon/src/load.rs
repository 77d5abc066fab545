use std::{fs::File, io::Read, path::Path};

use thiserror::Error;

use crate::vm::HorizonVm;
use crate::word::Word;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("binary is {0} bytes, not a whole number of words")]
    Misaligned(usize),
    #[error("could not read binary")]
    Io(#[from] std::io::Error),
}

/// Little-endian, one word after another.
pub fn to_binary(words: &[Word]) -> Vec<u8> {
    words.iter().flat_map(|word| word.to_le_bytes()).collect()
}

pub fn from_binary(bytes: &[u8]) -> Result<Vec<Word>, LoadError> {
    if bytes.len() % 4 != 0 {
        return Err(LoadError::Misaligned(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| Word::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

pub fn load_binary_from<P: AsRef<Path>>(path: P) -> Result<Vec<Word>, LoadError> {
    let mut file = File::open(path)?;
    let mut content = Vec::new();
    file.read_to_end(&mut content)?;
    from_binary(&content)
}

pub fn vm_with_program(program: &[Word]) -> HorizonVm {
    let mut vm = HorizonVm::empty();
    vm.load_rom(program);
    vm
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::vm::RAM_SIZE;

    #[test]
    fn binary() {
        let words = [0xAA00_0001, 0x2A00_0F00];
        let bytes = to_binary(&words);
        assert_eq!(bytes, vec![0x01, 0x00, 0x00, 0xAA, 0x00, 0x0F, 0x00, 0x2A]);
        assert_eq!(from_binary(&bytes).unwrap(), words);
    }

    #[test]
    fn misaligned() {
        let err = from_binary(&[0, 1, 2]).unwrap_err();
        assert!(matches!(err, LoadError::Misaligned(3)));
    }

    #[test]
    fn truncates_to_ram() {
        let program = vec![0x2B00_0000; RAM_SIZE + 10];
        let mut vm = HorizonVm::empty();
        assert_eq!(vm.load_rom(&program), RAM_SIZE);

        let vm = vm_with_program(&[7, 8]);
        assert_eq!(&vm.ram[..3], &[7, 8, 0]);
    }
}
