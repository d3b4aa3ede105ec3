//! Class-file header reader.
//!
//! Reads the constant pool, access flags, this/super class, interfaces and
//! method signatures. Attribute bodies are skipped.

use thiserror::Error;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;
pub const ACC_ANNOTATION: u16 = 0x2000;
pub const ACC_ENUM: u16 = 0x4000;

const MAGIC: u32 = 0xCAFE_BABE;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassFileError {
    #[error("Truncated class file")]
    Truncated,

    #[error("Bad magic {0:#010x}")]
    BadMagic(u32),

    #[error("Unknown constant pool tag {0}")]
    UnknownTag(u8),

    #[error("Constant pool entry {0} is not the expected kind")]
    BadConstant(u16),
}

/// A declared method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    pub access: u16,
    pub name: String,
    pub descriptor: String,
}

/// Parsed class header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassFile {
    pub major_version: u16,
    pub access: u16,
    /// Dotted binary name (`com.acme.Button`).
    pub name: String,
    /// `None` only for `java.lang.Object`.
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub methods: Vec<MethodInfo>,
}

enum Constant {
    Utf8(String),
    Class(u16),
    Other,
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], ClassFileError> {
        let end = self.pos.checked_add(n).ok_or(ClassFileError::Truncated)?;
        let slice = self.data.get(self.pos..end).ok_or(ClassFileError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, ClassFileError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, ClassFileError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, ClassFileError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn skip_attributes(&mut self) -> Result<(), ClassFileError> {
        for _ in 0..self.u16()? {
            self.u16()?;
            let len = self.u32()? as usize;
            self.take(len)?;
        }
        Ok(())
    }
}

struct Pool(Vec<Constant>);

impl Pool {
    fn read(r: &mut Reader<'_>) -> Result<Self, ClassFileError> {
        let count = r.u16()? as usize;
        let mut entries = Vec::with_capacity(count);
        // Index 0 is unused.
        entries.push(Constant::Other);
        while entries.len() < count {
            let tag = r.u8()?;
            let constant = match tag {
                1 => {
                    let len = r.u16()? as usize;
                    Constant::Utf8(String::from_utf8_lossy(r.take(len)?).into_owned())
                }
                7 => Constant::Class(r.u16()?),
                3 | 4 => {
                    r.take(4)?;
                    Constant::Other
                }
                5 | 6 => {
                    r.take(8)?;
                    // Eight-byte constants occupy two slots.
                    entries.push(Constant::Other);
                    Constant::Other
                }
                8 | 16 | 19 | 20 => {
                    r.take(2)?;
                    Constant::Other
                }
                9 | 10 | 11 | 12 | 17 | 18 => {
                    r.take(4)?;
                    Constant::Other
                }
                15 => {
                    r.take(3)?;
                    Constant::Other
                }
                other => return Err(ClassFileError::UnknownTag(other)),
            };
            entries.push(constant);
        }
        Ok(Self(entries))
    }

    fn utf8(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.0.get(index as usize) {
            Some(Constant::Utf8(s)) => Ok(s),
            _ => Err(ClassFileError::BadConstant(index)),
        }
    }

    fn class_name(&self, index: u16) -> Result<String, ClassFileError> {
        match self.0.get(index as usize) {
            Some(Constant::Class(name)) => Ok(self.utf8(*name)?.replace('/', ".")),
            _ => Err(ClassFileError::BadConstant(index)),
        }
    }
}

impl ClassFile {
    /// Parse a class file.
    ///
    /// # Errors
    ///
    /// Returns an error for truncated or malformed input.
    pub fn parse(data: &[u8]) -> Result<Self, ClassFileError> {
        let mut r = Reader { data, pos: 0 };
        let magic = r.u32()?;
        if magic != MAGIC {
            return Err(ClassFileError::BadMagic(magic));
        }
        let _minor = r.u16()?;
        let major_version = r.u16()?;
        let pool = Pool::read(&mut r)?;

        let access = r.u16()?;
        let name = pool.class_name(r.u16()?)?;
        let super_index = r.u16()?;
        let super_name = if super_index == 0 {
            None
        } else {
            Some(pool.class_name(super_index)?)
        };

        let mut interfaces = Vec::new();
        for _ in 0..r.u16()? {
            interfaces.push(pool.class_name(r.u16()?)?);
        }

        for _ in 0..r.u16()? {
            r.take(6)?;
            r.skip_attributes()?;
        }

        let mut methods = Vec::new();
        for _ in 0..r.u16()? {
            let access = r.u16()?;
            let name = pool.utf8(r.u16()?)?.to_string();
            let descriptor = pool.utf8(r.u16()?)?.to_string();
            r.skip_attributes()?;
            methods.push(MethodInfo {
                access,
                name,
                descriptor,
            });
        }

        Ok(Self {
            major_version,
            access,
            name,
            super_name,
            interfaces,
            methods,
        })
    }

    pub fn is_public(&self) -> bool {
        self.access & ACC_PUBLIC != 0
    }

    /// A class that can have direct instances: not an interface,
    /// annotation, enum or abstract class.
    pub fn is_concrete(&self) -> bool {
        self.access & (ACC_INTERFACE | ACC_ABSTRACT | ACC_ANNOTATION | ACC_ENUM) == 0
    }

    pub fn has_public_no_arg_constructor(&self) -> bool {
        self.methods
            .iter()
            .any(|m| m.name == "<init>" && m.descriptor == "()V" && m.access & ACC_PUBLIC != 0)
    }
}

/// Builds minimal class files for tests.
#[cfg(test)]
pub(crate) mod testing {
    use super::ACC_PUBLIC;

    pub(crate) struct ClassFixture<'a> {
        pub name: &'a str,
        pub super_name: &'a str,
        pub access: u16,
        /// Access flags of a `()V` constructor, if declared.
        pub constructor: Option<u16>,
    }

    impl<'a> ClassFixture<'a> {
        pub(crate) fn public(name: &'a str, super_name: &'a str) -> Self {
            Self {
                name,
                super_name,
                access: ACC_PUBLIC,
                constructor: Some(ACC_PUBLIC),
            }
        }

        pub(crate) fn to_bytes(&self) -> Vec<u8> {
            let mut pool: Vec<Vec<u8>> = Vec::new();
            let utf8 = |pool: &mut Vec<Vec<u8>>, s: &str| {
                let mut e = vec![1];
                e.extend((s.len() as u16).to_be_bytes());
                e.extend(s.as_bytes());
                pool.push(e);
                pool.len() as u16
            };
            let this_name = utf8(&mut pool, &self.name.replace('.', "/"));
            pool.push([vec![7], this_name.to_be_bytes().to_vec()].concat());
            let this_class = pool.len() as u16;
            let super_name = utf8(&mut pool, &self.super_name.replace('.', "/"));
            pool.push([vec![7], super_name.to_be_bytes().to_vec()].concat());
            let super_class = pool.len() as u16;
            let init = utf8(&mut pool, "<init>");
            let void = utf8(&mut pool, "()V");
            // A long constant exercises the two-slot rule.
            pool.push(vec![5, 0, 0, 0, 0, 0, 0, 0, 42]);
            pool.push(Vec::new());

            let mut out = Vec::new();
            out.extend(0xCAFE_BABE_u32.to_be_bytes());
            out.extend([0, 0, 0, 61]);
            out.extend((pool.len() as u16 + 1).to_be_bytes());
            for entry in &pool {
                out.extend(entry);
            }
            out.extend(self.access.to_be_bytes());
            out.extend(this_class.to_be_bytes());
            out.extend(super_class.to_be_bytes());
            out.extend(0u16.to_be_bytes()); // interfaces
            out.extend(0u16.to_be_bytes()); // fields
            match self.constructor {
                Some(access) => {
                    out.extend(1u16.to_be_bytes());
                    out.extend(access.to_be_bytes());
                    out.extend(init.to_be_bytes());
                    out.extend(void.to_be_bytes());
                    out.extend(0u16.to_be_bytes());
                }
                None => out.extend(0u16.to_be_bytes()),
            }
            out.extend(0u16.to_be_bytes()); // attributes
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ClassFixture;
    use super::*;

    #[test]
    fn test_parse_header() {
        let bytes = ClassFixture::public("com.acme.Button", "javafx.scene.control.Control").to_bytes();
        let class = ClassFile::parse(&bytes).unwrap();
        assert_eq!(class.major_version, 61);
        assert_eq!(class.name, "com.acme.Button");
        assert_eq!(class.super_name.as_deref(), Some("javafx.scene.control.Control"));
        assert!(class.is_public());
        assert!(class.is_concrete());
        assert!(class.has_public_no_arg_constructor());
    }

    #[test]
    fn test_flags() {
        let fixture = ClassFixture {
            name: "com.acme.Shape",
            super_name: "java.lang.Object",
            access: ACC_PUBLIC | ACC_ABSTRACT,
            constructor: Some(0x0002),
        };
        let class = ClassFile::parse(&fixture.to_bytes()).unwrap();
        assert!(!class.is_concrete());
        assert!(!class.has_public_no_arg_constructor());
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(
            ClassFile::parse(&[0xDE, 0xAD, 0xBE, 0xEF]),
            Err(ClassFileError::BadMagic(0xDEAD_BEEF))
        );
        let bytes = ClassFixture::public("a.B", "java.lang.Object").to_bytes();
        assert_eq!(
            ClassFile::parse(&bytes[..bytes.len() / 2]),
            Err(ClassFileError::Truncated)
        );
    }
}
