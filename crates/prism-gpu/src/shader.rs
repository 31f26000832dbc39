//! Shader module loading.
//!
//! One SPIR-V module carries both the vertex and fragment entry points;
//! the entry names are configurable per pipeline.

use crate::error::{GpuError, Result};
use ash::vk;
use std::ffi::CString;
use std::path::Path;

/// First word of every valid SPIR-V module.
const SPIRV_MAGIC: u32 = 0x0723_0203;

/// A shader module with named vertex and fragment entry points.
pub struct ShaderModule {
    module: vk::ShaderModule,
    vertex_entry: CString,
    fragment_entry: CString,
}

impl ShaderModule {
    /// Load a SPIR-V module from a file.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn from_file(
        device: &ash::Device,
        path: &Path,
        vertex_entry: &str,
        fragment_entry: &str,
    ) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            GpuError::Shader(format!("Failed to read {}: {e}", path.display()))
        })?;

        Self::from_spirv_bytes(device, &bytes, vertex_entry, fragment_entry)
    }

    /// Create a module from raw SPIR-V bytes.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn from_spirv_bytes(
        device: &ash::Device,
        bytes: &[u8],
        vertex_entry: &str,
        fragment_entry: &str,
    ) -> Result<Self> {
        let code = bytes_to_spirv(bytes)?;

        let create_info = vk::ShaderModuleCreateInfo::default().code(&code);
        let module = device
            .create_shader_module(&create_info, None)
            .map_err(|e| GpuError::Shader(e.to_string()))?;

        let vertex_entry = CString::new(vertex_entry)
            .map_err(|_| GpuError::Shader("Vertex entry name contains a nul byte".to_string()))?;
        let fragment_entry = CString::new(fragment_entry)
            .map_err(|_| GpuError::Shader("Fragment entry name contains a nul byte".to_string()))?;

        Ok(Self {
            module,
            vertex_entry,
            fragment_entry,
        })
    }

    /// Get the raw module handle.
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    /// Shader stage create infos for the two entry points.
    pub fn stage_infos(&self) -> [vk::PipelineShaderStageCreateInfo<'_>; 2] {
        [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(self.module)
                .name(self.vertex_entry.as_c_str()),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(self.module)
                .name(self.fragment_entry.as_c_str()),
        ]
    }

    /// Destroy the module.
    ///
    /// # Safety
    /// The device must be valid and no pipeline creation may be using
    /// the module.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_shader_module(self.module, None);
    }
}

/// Convert SPIR-V bytes to words, validating alignment and magic.
fn bytes_to_spirv(bytes: &[u8]) -> Result<Vec<u32>> {
    if bytes.len() % 4 != 0 {
        return Err(GpuError::Shader(format!(
            "SPIR-V bytecode length {} is not 4-byte aligned",
            bytes.len()
        )));
    }

    let code: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    match code.first() {
        Some(&SPIRV_MAGIC) => Ok(code),
        Some(&word) => Err(GpuError::Shader(format!(
            "Bad SPIR-V magic number {word:#010x}"
        ))),
        None => Err(GpuError::Shader("Empty SPIR-V module".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spirv_bytes(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn valid_module_converts_to_words() {
        let bytes = spirv_bytes(&[SPIRV_MAGIC, 0x0001_0000, 42]);
        let code = bytes_to_spirv(&bytes).unwrap();
        assert_eq!(code, vec![SPIRV_MAGIC, 0x0001_0000, 42]);
    }

    #[test]
    fn misaligned_bytes_are_rejected() {
        let mut bytes = spirv_bytes(&[SPIRV_MAGIC]);
        bytes.push(0);
        assert!(bytes_to_spirv(&bytes).is_err());
    }

    #[test]
    fn bad_magic_is_rejected() {
        let bytes = spirv_bytes(&[0xDEAD_BEEF]);
        let err = bytes_to_spirv(&bytes).unwrap_err();
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn empty_module_is_rejected() {
        assert!(bytes_to_spirv(&[]).is_err());
    }
}
