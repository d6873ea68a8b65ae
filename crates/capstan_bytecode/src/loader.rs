//! Loading: bytes in, validated [`Program`] out.

use capstan_foundation::CapabilityCatalog;
use tracing::{debug, instrument};

use crate::encoding::{self, Cursor};
use crate::error::LoadError;
use crate::program::Program;
use crate::validate;

/// Default upper bound on the code section: 16 MiB.
pub const DEFAULT_MAX_CODE_LEN: usize = 16 * 1024 * 1024;

/// Loader configuration.
#[derive(Clone, Debug)]
pub struct LoaderOptions {
    /// Longest accepted code section, in bytes.
    pub max_code_len: usize,
    /// When set, every declared capability must be honored by this catalog
    /// and every INVOKE must match the honored arity.
    pub catalog: Option<CapabilityCatalog>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            max_code_len: DEFAULT_MAX_CODE_LEN,
            catalog: None,
        }
    }
}

/// Decodes and validates bytecode buffers.
///
/// Loading fails closed: the first problem rejects the whole buffer and no
/// [`Program`] is produced.
///
/// # Example
///
/// ```
/// use capstan_bytecode::{Assembler, Instruction, Loader};
///
/// let bytes = Assembler::from_instructions(&[
///     Instruction::Push(2),
///     Instruction::Push(3),
///     Instruction::Add,
///     Instruction::Halt,
/// ])
/// .unwrap();
///
/// let program = Loader::new().load(&bytes).unwrap();
/// assert_eq!(program.len(), 4);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Loader {
    options: LoaderOptions,
}

impl Loader {
    /// Creates a loader with default options and no catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a loader with the given options.
    #[must_use]
    pub fn with_options(options: LoaderOptions) -> Self {
        Self { options }
    }

    /// Requires declared capabilities to be honored by `catalog`.
    #[must_use]
    pub fn with_catalog(mut self, catalog: CapabilityCatalog) -> Self {
        self.options.catalog = Some(catalog);
        self
    }

    /// Sets the longest accepted code section.
    #[must_use]
    pub fn with_max_code_len(mut self, max_code_len: usize) -> Self {
        self.options.max_code_len = max_code_len;
        self
    }

    /// Returns the loader's options.
    #[must_use]
    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Decodes and validates `bytes`.
    ///
    /// # Errors
    /// Returns the first [`LoadError`] found, in the order: header, code
    /// structure, capabilities, control-flow targets, stack depths.
    #[instrument(skip_all, fields(len = bytes.len()))]
    pub fn load(&self, bytes: &[u8]) -> Result<Program, LoadError> {
        let mut cursor = Cursor::new(bytes);
        let header = encoding::read_header(&mut cursor)?;

        let available = cursor.remaining();
        let code_len = cursor.u32().ok_or(LoadError::TruncatedHeader {
            needed: 4,
            available,
        })?;
        let declared = code_len as usize;
        if declared > self.options.max_code_len {
            return Err(LoadError::CodeTooLarge {
                len: declared,
                limit: self.options.max_code_len,
            });
        }
        let available = cursor.remaining();
        let code = cursor
            .take(declared)
            .ok_or(LoadError::TruncatedCode { declared, available })?;
        if cursor.remaining() > 0 {
            return Err(LoadError::TrailingBytes(cursor.remaining()));
        }

        let decoded = encoding::decode_code(code)?;
        validate::check_capabilities(
            &decoded,
            &header.capabilities,
            self.options.catalog.as_ref(),
        )?;
        let (instructions, entry) = validate::resolve_targets(&decoded, code_len, header.entry)?;
        let offsets: Vec<u32> = decoded.iter().map(|d| d.offset).collect();
        validate::check_stack_depths(&instructions, &offsets, entry)?;

        debug!(
            instructions = instructions.len(),
            capabilities = header.capabilities.len(),
            entry,
            "program loaded"
        );

        Ok(Program::new(
            instructions,
            offsets,
            entry,
            header.capabilities,
            (header.major, header.minor),
        ))
    }
}

/// Loads `bytes` with default options.
///
/// # Errors
/// See [`Loader::load`].
pub fn load(bytes: &[u8]) -> Result<Program, LoadError> {
    Loader::new().load(bytes)
}
