//! HiPS tile address parsing and URL construction.
//!
//! Tile servers expose a hierarchical pyramid with the fixed directory
//! convention:
//!
//! `{prefix}/Norder{order}/Dir{dir}/Npix{pixel}.{ext}`
//!
//! Examples:
//! - `https://alasky.example/DSS2/Norder3/Dir0/Npix42.jpg`
//! - `https://alasky.example/VLASS/Norder9/Dir20000/Npix28311.png`
//!
//! The `Dir` component is redundant (it is always `10000 * floor(pixel / 10000)`
//! on a well-behaved server) so it is accepted as-is when parsing and
//! recomputed when building. Building is the canonical form used as the
//! cache key: two addresses with the same fields always produce
//! byte-identical URLs.

mod neighbors;

pub use neighbors::{neighbors, DEFAULT_MAX_ORDER, PLANAR_OFFSETS};

use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

/// Number of pixels grouped under one `Dir` directory.
pub const PIXELS_PER_DIR: u64 = 10_000;

/// Image formats a HiPS server may publish tiles in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileExtension {
    Jpg,
    Jpeg,
    Png,
    Webp,
    Fits,
}

impl TileExtension {
    /// Lower-case file extension without the leading dot.
    pub fn as_str(&self) -> &'static str {
        match self {
            TileExtension::Jpg => "jpg",
            TileExtension::Jpeg => "jpeg",
            TileExtension::Png => "png",
            TileExtension::Webp => "webp",
            TileExtension::Fits => "fits",
        }
    }
}

impl fmt::Display for TileExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TileExtension {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpg" => Ok(TileExtension::Jpg),
            "jpeg" => Ok(TileExtension::Jpeg),
            "png" => Ok(TileExtension::Png),
            "webp" => Ok(TileExtension::Webp),
            "fits" => Ok(TileExtension::Fits),
            other => Err(AddressError::UnsupportedExtension(other.to_string())),
        }
    }
}

/// Error parsing a tile URL.
///
/// Every variant means "not a tile": callers pass such requests through
/// untouched rather than surfacing the error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// URL scheme is not `http` or `https`.
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    /// Path does not follow the `Norder/Dir/Npix` convention.
    #[error("URL doesn't match HiPS tile pattern")]
    InvalidPattern,

    /// Order component does not fit the address type.
    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    /// Pixel component does not fit the address type.
    #[error("Invalid pixel index: {0}")]
    InvalidPixel(String),

    /// File extension is not a known tile format.
    #[error("Unsupported tile extension: {0}")]
    UnsupportedExtension(String),
}

/// Canonical address of one tile in a HiPS pyramid.
///
/// Immutable value type; equality covers every field, so tiles of the same
/// survey published in two formats are distinct addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileAddress {
    prefix: String,
    order: u32,
    pixel: u64,
    extension: TileExtension,
}

impl TileAddress {
    /// Create a tile address.
    ///
    /// # Arguments
    ///
    /// * `prefix` - Survey root URL, without a trailing slash
    /// * `order` - Pyramid depth
    /// * `pixel` - Tile index at that depth
    /// * `extension` - Tile image format
    pub fn new(
        prefix: impl Into<String>,
        order: u32,
        pixel: u64,
        extension: TileExtension,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            order,
            pixel,
            extension,
        }
    }

    /// Parse a tile URL.
    ///
    /// Only absolute `http`/`https` URLs whose path ends in
    /// `/Norder<N>/Dir<D>/Npix<P>.<ext>` are tiles. The directory value is
    /// not checked against the pixel index.
    ///
    /// # Examples
    ///
    /// ```
    /// use skytile::address::{TileAddress, TileExtension};
    ///
    /// let tile = TileAddress::parse("https://example.org/hips/Norder8/Dir0/Npix123.JPG").unwrap();
    /// assert_eq!(tile.order(), 8);
    /// assert_eq!(tile.pixel(), 123);
    /// assert_eq!(tile.extension(), TileExtension::Jpg);
    /// assert_eq!(tile.prefix(), "https://example.org/hips");
    /// ```
    pub fn parse(url: &str) -> Result<Self, AddressError> {
        let scheme_end = url.find("://").ok_or(AddressError::InvalidPattern)?;
        let scheme = &url[..scheme_end];
        if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
            return Err(AddressError::UnsupportedScheme(scheme.to_string()));
        }

        let captures = tile_pattern()
            .captures(url)
            .ok_or(AddressError::InvalidPattern)?;

        let prefix = &captures[1];
        // Prefix must include a host after "scheme://".
        if prefix.len() <= scheme_end + 3 {
            return Err(AddressError::InvalidPattern);
        }

        let order_str = &captures[2];
        let order = order_str
            .parse::<u32>()
            .map_err(|_| AddressError::InvalidOrder(order_str.to_string()))?;

        let pixel_str = &captures[3];
        let pixel = pixel_str
            .parse::<u64>()
            .map_err(|_| AddressError::InvalidPixel(pixel_str.to_string()))?;

        let extension = captures[4].parse::<TileExtension>()?;

        Ok(Self {
            prefix: prefix.to_string(),
            order,
            pixel,
            extension,
        })
    }

    /// Survey root URL.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Pyramid depth.
    pub fn order(&self) -> u32 {
        self.order
    }

    /// Tile index at this order.
    pub fn pixel(&self) -> u64 {
        self.pixel
    }

    /// Tile image format.
    pub fn extension(&self) -> TileExtension {
        self.extension
    }

    /// Canonical `Dir` component for this tile.
    pub fn dir(&self) -> u64 {
        (self.pixel / PIXELS_PER_DIR) * PIXELS_PER_DIR
    }

    /// Same survey and format, different position in the pyramid.
    pub fn with_position(&self, order: u32, pixel: u64) -> Self {
        Self {
            prefix: self.prefix.clone(),
            order,
            pixel,
            extension: self.extension,
        }
    }

    /// Canonical URL for this tile; also the cache key.
    pub fn to_url(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TileAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/Norder{}/Dir{}/Npix{}.{}",
            self.prefix,
            self.order,
            self.dir(),
            self.pixel,
            self.extension
        )
    }
}

impl FromStr for TileAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Tile URL regex.
///
/// We capture:
/// - Group 1: everything before `/Norder` (the survey prefix)
/// - Group 2: order
/// - Group 3: pixel index
/// - Group 4: extension (case-insensitive)
fn tile_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(.*)/Norder(\d+)/Dir\d+/Npix(\d+)\.((?i:jpg|jpeg|png|webp|fits))$")
            .expect("tile URL pattern is valid")
    })
}
