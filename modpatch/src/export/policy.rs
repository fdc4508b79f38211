//! Per-category export policies.
//!
//! Each category of resolved entries is exported with a fixed pair of
//! policies: how the output file name is chosen and whether an existing file
//! is left alone. [`ExportCategory::policy`] maps every category to its pair;
//! adding a category without a policy does not compile.

/// How the output file name of an entry is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileNameGeneration {
    /// Ask the game's naming provider.
    GenerateFileName,
    /// Keep the entry's `File`.
    UseExistingFileName,
    /// Keep the entry's `File` and create empty files for every other
    /// name the entry overwrites.
    UseExistingFileNameAndWriteEmptyFiles,
}

/// Categories of resolved entries handed to the exporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportCategory {
    Definitions,
    OrphanConflicts,
    OverwrittenConflicts,
    CustomConflicts,
}

/// What to do for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportPolicy {
    pub file_names: FileNameGeneration,
    /// Leave an already exported file untouched.
    pub skip_if_exists: bool,
}

impl ExportCategory {
    /// Every category, in export order.
    pub const ALL: [ExportCategory; 4] = [
        Self::Definitions,
        Self::OrphanConflicts,
        Self::OverwrittenConflicts,
        Self::CustomConflicts,
    ];

    /// Policy applied to this category.
    pub const fn policy(self) -> ExportPolicy {
        let (file_names, skip_if_exists) = match self {
            Self::Definitions => (FileNameGeneration::GenerateFileName, false),
            Self::OrphanConflicts => (FileNameGeneration::GenerateFileName, true),
            Self::OverwrittenConflicts => {
                (FileNameGeneration::UseExistingFileNameAndWriteEmptyFiles, true)
            }
            Self::CustomConflicts => (FileNameGeneration::UseExistingFileName, false),
        };
        ExportPolicy {
            file_names,
            skip_if_exists,
        }
    }
}

impl FileNameGeneration {
    /// Whether the naming provider picks the file name.
    pub fn generates_name(self) -> bool {
        matches!(self, Self::GenerateFileName)
    }

    /// Whether empty placeholders are written for overwritten names.
    pub fn writes_empty_files(self) -> bool {
        matches!(self, Self::UseExistingFileNameAndWriteEmptyFiles)
    }
}
