use std::cmp;
use std::ffi;

use gl;
use gl::types::*;

use crate::errors::*;

/// Describes a version.
///
/// A version can only be compared to another version if they belong to the same API.
/// For example, both `Version::GL(3, 0) >= Version::ES(3, 0)` and `Version::ES(3, 0) >=
/// Version::GL(3, 0)` return `false`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Version {
    /// Regular OpenGL.
    GL(u8, u8),
    /// OpenGL embedded system.
    ES(u8, u8),
}

impl PartialOrd for Version {
    #[inline]
    fn partial_cmp(&self, other: &Version) -> Option<cmp::Ordering> {
        match (*self, *other) {
            (Version::GL(a0, a1), Version::GL(b0, b1))
            | (Version::ES(a0, a1), Version::ES(b0, b1)) => Some((a0, a1).cmp(&(b0, b1))),
            _ => None,
        }
    }
}

impl Version {
    /// Parses a `GL_VERSION` string like `4.5.0 NVIDIA 390.77` or `OpenGL ES 3.0 Mesa`.
    pub fn parse(desc: &str) -> Result<Version> {
        let (es, desc) = if desc.starts_with("OpenGL ES-") {
            (true, &desc[13..])
        } else if desc.starts_with("OpenGL ES ") {
            (true, &desc[10..])
        } else {
            (false, desc)
        };

        let desc = desc
            .split(' ')
            .next()
            .ok_or_else(|| format_err!("[GL] Version string '{}' is malformed.", desc))?;

        let mut iter = desc.split('.');
        let mut next = || -> Result<u8> {
            iter.next()
                .and_then(|v| v.parse().ok())
                .ok_or_else(|| format_err!("[GL] Version string '{}' is malformed.", desc))
        };

        let major = next()?;
        let minor = next()?;

        if es {
            Ok(Version::ES(major, minor))
        } else {
            Ok(Version::GL(major, minor))
        }
    }

    /// The highest GLSL version guaranteed by this context version.
    pub fn glsl(self) -> u32 {
        match self {
            Version::GL(2, 0) => 110,
            Version::GL(2, 1) => 120,
            Version::GL(3, 0) => 130,
            Version::GL(3, 1) => 140,
            Version::GL(3, 2) => 150,
            Version::GL(major, minor) if major >= 3 => major as u32 * 100 + minor as u32 * 10,
            Version::ES(3, minor) => 300 + minor as u32 * 10,
            _ => 100,
        }
    }
}

macro_rules! extensions {
    ($($string:expr => $field:ident,)+) => {
        /// Contains data about the list of extensions.
        #[derive(Debug, Clone, Copy, Default)]
        pub struct Extensions {
            $(
                pub $field: bool,
            )+
        }

        impl Extensions {
            pub fn from_strings<'a, T>(strings: T) -> Extensions
            where
                T: IntoIterator<Item = &'a str>,
            {
                let mut extensions = Extensions::default();
                for extension in strings {
                    match extension {
                        $(
                            $string => extensions.$field = true,
                        )+
                        _ => ()
                    }
                }

                extensions
            }
        }
    }
}

extensions! {
    "GL_ARB_shader_objects" => gl_arb_shader_objects,
    "GL_ARB_vertex_array_object" => gl_arb_vertex_array_object,
    "GL_ARB_framebuffer_object" => gl_arb_framebuffer_object,
    "GL_ARB_tessellation_shader" => gl_arb_tessellation_shader,
    "GL_ARB_geometry_shader4" => gl_arb_geometry_shader4,
    "GL_ARB_compute_shader" => gl_arb_compute_shader,
    "GL_ARB_sample_shading" => gl_arb_sample_shading,
    "GL_ARB_texture_buffer_object" => gl_arb_texture_buffer_object,
    "GL_ARB_uniform_buffer_object" => gl_arb_uniform_buffer_object,
    "GL_EXT_transform_feedback" => gl_ext_transform_feedback,
    "GL_APPLE_vertex_array_object" => gl_apple_vertex_array_object,
}

/// Represents the capabilities of the context.
///
/// Contrary to the state, these values never change.
#[derive(Debug, Clone)]
pub struct Capabilities {
    pub version: Version,
    pub vendor: String,
    pub renderer: String,
    pub extensions: Extensions,
    /// Maximum number of textures that can be bound to a program.
    pub max_combined_texture_image_units: u32,
    /// Maximum number of separate components captured by transform feedback.
    pub max_feedback_separate_attribs: u32,
}

impl Capabilities {
    /// Queries the capabilities of the current context.
    pub unsafe fn parse() -> Result<Capabilities> {
        let version = Version::parse(&Self::parse_str(gl::VERSION)?)?;

        let strings: Vec<String> = if version >= Version::GL(3, 0) {
            let mut num = 0;
            gl::GetIntegerv(gl::NUM_EXTENSIONS, &mut num);
            (0..num)
                .filter_map(|i| Self::parse_stri(gl::EXTENSIONS, i as GLuint))
                .collect()
        } else {
            Self::parse_str(gl::EXTENSIONS)?
                .split(' ')
                .map(|v| v.to_owned())
                .collect()
        };

        let mut units = 0;
        gl::GetIntegerv(gl::MAX_COMBINED_TEXTURE_IMAGE_UNITS, &mut units);

        let mut attribs = 0;
        gl::GetIntegerv(gl::MAX_TRANSFORM_FEEDBACK_SEPARATE_ATTRIBS, &mut attribs);

        Ok(Capabilities {
            version,
            vendor: Self::parse_str(gl::VENDOR)?,
            renderer: Self::parse_str(gl::RENDERER)?,
            extensions: Extensions::from_strings(strings.iter().map(|v| v.as_str())),
            max_combined_texture_image_units: units.max(1) as u32,
            max_feedback_separate_attribs: attribs.max(0) as u32,
        })
    }

    unsafe fn parse_str(id: GLenum) -> Result<String> {
        let s = gl::GetString(id);
        if s.is_null() {
            bail!("[GL] String of {} is null.", id);
        }

        String::from_utf8(ffi::CStr::from_ptr(s as *const _).to_bytes().to_vec())
            .map_err(|_| format_err!("[GL] String of {} is malformed.", id))
    }

    unsafe fn parse_stri(id: GLenum, index: GLuint) -> Option<String> {
        let s = gl::GetStringi(id, index);
        if s.is_null() {
            return None;
        }

        String::from_utf8(ffi::CStr::from_ptr(s as *const _).to_bytes().to_vec()).ok()
    }
}

/// Rejects contexts lacking what the state stacks and the shader pipeline need.
pub fn check_capabilities(caps: &Capabilities) -> Result<()> {
    let require = |name: &str| -> Result<()> {
        Err(Error::ExtensionUnsupported(name.to_owned()).into())
    };

    if caps.version < Version::GL(2, 0) && !caps.extensions.gl_arb_shader_objects {
        return require("shader objects");
    }

    if caps.version < Version::GL(3, 0)
        && !caps.extensions.gl_arb_vertex_array_object
        && !caps.extensions.gl_apple_vertex_array_object
    {
        return require("vertex array objects");
    }

    if caps.version < Version::GL(3, 0) && !caps.extensions.gl_arb_framebuffer_object {
        return require("framebuffer objects");
    }

    if caps.version < Version::GL(3, 0) && !caps.extensions.gl_ext_transform_feedback {
        return require("transform feedback");
    }

    Ok(())
}
