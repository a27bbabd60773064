//! 52-byte PVR texture-page header (§4.4.3).

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use pie4k_types::{PieError, PieResult};

pub const PVR_HEADER_LEN: usize = 52;
const PVR_SIGNATURE: u32 = 0x0352_5650;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Dxt1,
    Dxt5,
}

impl PixelFormat {
    fn code(self) -> u64 {
        match self {
            PixelFormat::Dxt1 => 7,
            PixelFormat::Dxt5 => 11,
        }
    }

    fn from_code(code: u64) -> PieResult<PixelFormat> {
        match code {
            7 => Ok(PixelFormat::Dxt1),
            11 => Ok(PixelFormat::Dxt5),
            other => Err(PieError::DecodeError(format!("unsupported PVR pixel format code {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PvrHeader {
    pub pixel_format: PixelFormat,
    pub width: u32,
    pub height: u32,
}

impl PvrHeader {
    pub fn write(&self, out: &mut Vec<u8>) -> PieResult<()> {
        out.write_u32::<LittleEndian>(PVR_SIGNATURE)?;
        out.write_u32::<LittleEndian>(0)?; // flags
        out.write_u64::<LittleEndian>(self.pixel_format.code())?;
        out.write_u32::<LittleEndian>(0)?; // colorSpace
        out.write_u32::<LittleEndian>(0)?; // channelType
        // height precedes width on disk (§4.4.3) -- easy to transpose.
        out.write_u32::<LittleEndian>(self.height)?;
        out.write_u32::<LittleEndian>(self.width)?;
        out.write_u32::<LittleEndian>(1)?; // depth
        out.write_u32::<LittleEndian>(1)?; // numSurfaces
        out.write_u32::<LittleEndian>(1)?; // numFaces
        out.write_u32::<LittleEndian>(1)?; // numMipmaps
        out.write_u32::<LittleEndian>(0)?; // metaDataSize
        Ok(())
    }

    pub fn read(mut bytes: &[u8]) -> PieResult<PvrHeader> {
        if bytes.len() < PVR_HEADER_LEN {
            return Err(PieError::DecodeError("PVR header truncated".into()));
        }
        let signature = bytes.read_u32::<LittleEndian>()?;
        if signature != PVR_SIGNATURE {
            return Err(PieError::DecodeError(format!("bad PVR signature {signature:#x}")));
        }
        let _flags = bytes.read_u32::<LittleEndian>()?;
        let pixel_format = PixelFormat::from_code(bytes.read_u64::<LittleEndian>()?)?;
        let _color_space = bytes.read_u32::<LittleEndian>()?;
        let _channel_type = bytes.read_u32::<LittleEndian>()?;
        let height = bytes.read_u32::<LittleEndian>()?;
        let width = bytes.read_u32::<LittleEndian>()?;
        Ok(PvrHeader { pixel_format, width, height })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn height_precedes_width_on_disk() {
        let header = PvrHeader { pixel_format: PixelFormat::Dxt5, width: 64, height: 32 };
        let mut bytes = Vec::new();
        header.write(&mut bytes).unwrap();
        assert_eq!(bytes.len(), PVR_HEADER_LEN);
        // Byte offset 24..28 is height, 28..32 is width.
        let height_field = u32::from_le_bytes(bytes[24..28].try_into().unwrap());
        let width_field = u32::from_le_bytes(bytes[28..32].try_into().unwrap());
        assert_eq!(height_field, 32);
        assert_eq!(width_field, 64);
    }

    #[test]
    fn round_trips() {
        let header = PvrHeader { pixel_format: PixelFormat::Dxt1, width: 128, height: 256 };
        let mut bytes = Vec::new();
        header.write(&mut bytes).unwrap();
        let parsed = PvrHeader::read(&bytes).unwrap();
        assert_eq!(parsed, header);
    }
}
