//! # Incremental Wire-Format Parsers
//!
//! Single-character, non-backtracking parsers for the sensor's ASCII wire
//! format and for the output template's directive grammar. Each parser is a
//! small tagged state machine that is fed one byte at a time and never
//! buffers a whole line:
//!
//! - [`FloatParser`]: signed decimal floats (`-?\d*(\.\d*)?`, no exponent)
//! - [`ErrTokenParser`]: device error reports of the form `Err:<uint>`
//! - [`DirectiveParser`]: one `%[flags][width][.precision]type[subtype]`
//!   format directive
//!
//! All three share the same contract: the character that terminates a token
//! is consumed by the parser (it is not re-offered to anyone else), and a
//! parser that has reached `Stop` or an error state must be reset before it
//! accepts input again. Stepping a finished parser is a no-op that reports
//! [`ParseStatus::Failed`].

/// Outcome of feeding one character to a parser.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseStatus {
    /// The character was consumed; the token is still in progress.
    Continue,
    /// The character terminated the token; the result is available.
    Stop,
    /// The token attempt failed, or the parser was stepped without a reset.
    /// Check the parser's state for the reason.
    Failed,
}

// -- Float parser --

/// Progress tag of [`FloatParser`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FloatState {
    Start,
    Stop,
    ErrorToken,
    ErrorOverflow,
    /// Accumulating the integral part (a leading sign counts as entry).
    Integral,
    /// Accumulating the fraction part after the dot.
    Fraction,
    /// Fraction accumulator saturated; skipping further fraction digits.
    Remaining,
}

/// Passive streaming parser for signed decimal floats.
///
/// Supports an optional leading `-`, an integral part, and a fraction part
/// separated by a single dot. No exponent or hexadecimal forms; this reads a
/// fixed, narrow wire format, it is not a general float parser. The
/// character that does not fit the current part terminates the token and
/// yields the value via [`FloatParser::result`].
///
/// Overflow of the integral accumulator is fatal to the token
/// ([`FloatState::ErrorOverflow`]); overflow of the fraction accumulator
/// merely freezes it at the last valid value and further fraction digits are
/// skipped.
#[derive(Debug)]
pub struct FloatParser {
    state: FloatState,
    result: f32,
    sign: f32,
    integral: u64,
    fraction: u64,
    digits: u32,
}

impl Default for FloatParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FloatParser {
    pub fn new() -> Self {
        FloatParser {
            state: FloatState::Start,
            result: f32::NAN,
            sign: 1.0,
            integral: 0,
            fraction: 0,
            digits: 0,
        }
    }

    /// Return the parser to its initial state for the next token.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn state(&self) -> FloatState {
        self.state
    }

    /// The parsed value. Meaningful only after [`ParseStatus::Stop`];
    /// NaN while the token is still in progress.
    pub fn result(&self) -> f32 {
        self.result
    }

    /// Feed one character.
    pub fn step(&mut self, c: u8) -> ParseStatus {
        match self.state {
            FloatState::Start => match c {
                b'-' => {
                    self.state = FloatState::Integral;
                    self.sign = -1.0;
                    ParseStatus::Continue
                }
                b'0'..=b'9' => {
                    self.state = FloatState::Integral;
                    self.sign = 1.0;
                    self.on_integral(c)
                }
                b'.' => {
                    self.state = FloatState::Fraction;
                    ParseStatus::Continue
                }
                _ => {
                    self.state = FloatState::ErrorToken;
                    ParseStatus::Failed
                }
            },
            FloatState::Stop | FloatState::ErrorToken | FloatState::ErrorOverflow => {
                ParseStatus::Failed
            }
            FloatState::Integral => match c {
                b'0'..=b'9' => self.on_integral(c),
                b'.' => {
                    self.state = FloatState::Fraction;
                    ParseStatus::Continue
                }
                _ => {
                    self.state = FloatState::Stop;
                    self.result = self.sign * self.integral as f32;
                    ParseStatus::Stop
                }
            },
            FloatState::Fraction => match c {
                b'0'..=b'9' => {
                    match mul10_add(self.fraction, c) {
                        Some(v) => {
                            self.fraction = v;
                            self.digits += 1;
                        }
                        // Out of fraction precision: keep the value we have
                        // and swallow the remaining digits.
                        None => self.state = FloatState::Remaining,
                    }
                    ParseStatus::Continue
                }
                _ => self.finish(),
            },
            FloatState::Remaining => match c {
                b'0'..=b'9' => ParseStatus::Continue,
                _ => self.finish(),
            },
        }
    }

    fn on_integral(&mut self, c: u8) -> ParseStatus {
        match mul10_add(self.integral, c) {
            Some(v) => {
                self.integral = v;
                ParseStatus::Continue
            }
            None => {
                self.state = FloatState::ErrorOverflow;
                ParseStatus::Failed
            }
        }
    }

    fn finish(&mut self) -> ParseStatus {
        self.state = FloatState::Stop;
        self.result =
            self.sign * (self.integral as f32 + self.fraction as f32 / 10f32.powi(self.digits as i32));
        ParseStatus::Stop
    }
}

/// Shift-in one decimal digit, reporting overflow as `None`.
#[inline]
fn mul10_add(acc: u64, c: u8) -> Option<u64> {
    acc.checked_mul(10)?.checked_add(u64::from(c - b'0'))
}

// -- Error token parser --

/// Progress tag of [`ErrTokenParser`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrTokenState {
    Start,
    Stop,
    ErrorToken,
    ErrorOverflow,
    /// `E` matched.
    SeenE,
    /// `Er` matched.
    SeenEr,
    /// `Err` matched.
    SeenErr,
    /// `Err:` matched; skipping spaces/tabs before the first digit.
    IntegerStart,
    /// Accumulating the error code digits.
    Integer,
}

/// Passive recognizer for device error reports.
///
/// Matches the case-sensitive literal `Err:`, then any run of spaces or
/// tabs, then an unsigned decimal error code. A non-digit terminates the
/// code. Accumulator overflow clamps the code to `u32::MAX` and ends the
/// token with [`ErrTokenState::ErrorOverflow`].
#[derive(Debug)]
pub struct ErrTokenParser {
    state: ErrTokenState,
    result: u32,
}

impl Default for ErrTokenParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrTokenParser {
    pub fn new() -> Self {
        ErrTokenParser {
            state: ErrTokenState::Start,
            result: 0,
        }
    }

    /// Return the parser to its initial state for the next token.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn state(&self) -> ErrTokenState {
        self.state
    }

    /// The parsed error code. Meaningful only after [`ParseStatus::Stop`],
    /// except that an overflow leaves `u32::MAX` behind.
    pub fn result(&self) -> u32 {
        self.result
    }

    /// Feed one character.
    pub fn step(&mut self, c: u8) -> ParseStatus {
        match self.state {
            ErrTokenState::Start => self.expect(c, b'E', ErrTokenState::SeenE),
            ErrTokenState::Stop | ErrTokenState::ErrorToken | ErrTokenState::ErrorOverflow => {
                ParseStatus::Failed
            }
            ErrTokenState::SeenE => self.expect(c, b'r', ErrTokenState::SeenEr),
            ErrTokenState::SeenEr => self.expect(c, b'r', ErrTokenState::SeenErr),
            ErrTokenState::SeenErr => self.expect(c, b':', ErrTokenState::IntegerStart),
            ErrTokenState::IntegerStart => match c {
                b'0'..=b'9' => {
                    self.state = ErrTokenState::Integer;
                    self.result = u32::from(c - b'0');
                    ParseStatus::Continue
                }
                b' ' | b'\t' => ParseStatus::Continue,
                _ => {
                    self.state = ErrTokenState::ErrorToken;
                    ParseStatus::Failed
                }
            },
            ErrTokenState::Integer => match c {
                b'0'..=b'9' => {
                    match self
                        .result
                        .checked_mul(10)
                        .and_then(|v| v.checked_add(u32::from(c - b'0')))
                    {
                        Some(v) => {
                            self.result = v;
                            ParseStatus::Continue
                        }
                        None => {
                            self.state = ErrTokenState::ErrorOverflow;
                            self.result = u32::MAX;
                            ParseStatus::Failed
                        }
                    }
                }
                _ => {
                    self.state = ErrTokenState::Stop;
                    ParseStatus::Stop
                }
            },
        }
    }

    fn expect(&mut self, c: u8, want: u8, next: ErrTokenState) -> ParseStatus {
        if c == want {
            self.state = next;
            ParseStatus::Continue
        } else {
            self.state = ErrTokenState::ErrorToken;
            ParseStatus::Failed
        }
    }
}

// -- Format directive parser --

/// Printf-style formatting flags of a directive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DirectiveFlags {
    /// `-`: left-align within the field width.
    pub left_align: bool,
    /// `+`: always print a sign.
    pub force_sign: bool,
    /// `0`: pad with leading zeros.
    pub zero_pad: bool,
    /// ` `: blank in front of positive values.
    pub blank: bool,
    /// `#`: alternate form.
    pub alt_form: bool,
}

/// One fully scanned `%...` directive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FormatDirective {
    pub flags: DirectiveFlags,
    /// Minimum field width; 0 when not given.
    pub width: u32,
    /// Precision; `None` when no `.` was present, `Some(0)` for a bare `.`.
    pub precision: Option<u32>,
    /// Terminal type character. `\0` until one was seen.
    pub type_char: u8,
    /// Subtype character following a `v` type.
    pub subtype: Option<u8>,
}

/// Progress tag of [`DirectiveParser`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirectiveState {
    Start,
    Stop,
    ErrorToken,
    ErrorOverflow,
    Flag,
    Width,
    PrecisionStart,
    Precision,
    Subtype,
}

/// Closed alphabet of immediately terminal type characters. Everything here
/// except `%` is forwarded to the calendar formatter by the renderer.
const TYPE_ALPHABET: &[u8] = b"%aAbBcCdDeEFgGhHIjklmMnOpPrRsStTuUVwWxXyYzZ";

/// Passive recognizer for one output format directive.
///
/// Expects `%[flags][width][.precision]type[subtype]`. Flags accumulate in
/// any order and repetition; width starts with a digit `1`–`9`; precision
/// starts after `.`. The type character is consumed by the same scan that
/// terminates a width/precision run. The `v` type takes exactly one subtype
/// out of `{C, F, H}`; any other byte unrecognized at any stage ends the
/// scan with [`DirectiveState::ErrorToken`].
#[derive(Debug)]
pub struct DirectiveParser {
    state: DirectiveState,
    dir: FormatDirective,
}

impl Default for DirectiveParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectiveParser {
    pub fn new() -> Self {
        DirectiveParser {
            state: DirectiveState::Start,
            dir: FormatDirective::default(),
        }
    }

    /// Return the parser to its initial state for the next directive.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn state(&self) -> DirectiveState {
        self.state
    }

    /// The scanned directive. Complete only after [`ParseStatus::Stop`];
    /// on an error the fields hold whatever was recognized so far.
    pub fn directive(&self) -> FormatDirective {
        self.dir
    }

    /// Feed one character. The leading `%` is itself the first character.
    pub fn step(&mut self, c: u8) -> ParseStatus {
        match self.state {
            DirectiveState::Start => {
                if c == b'%' {
                    self.state = DirectiveState::Flag;
                    self.dir = FormatDirective::default();
                    ParseStatus::Continue
                } else {
                    self.state = DirectiveState::ErrorToken;
                    ParseStatus::Failed
                }
            }
            DirectiveState::Stop | DirectiveState::ErrorToken | DirectiveState::ErrorOverflow => {
                ParseStatus::Failed
            }
            DirectiveState::Flag => match c {
                b'-' => self.set_flag(|f| f.left_align = true),
                b'+' => self.set_flag(|f| f.force_sign = true),
                b'0' => self.set_flag(|f| f.zero_pad = true),
                b' ' => self.set_flag(|f| f.blank = true),
                b'#' => self.set_flag(|f| f.alt_form = true),
                b'.' => self.start_precision(),
                b'1'..=b'9' => {
                    self.state = DirectiveState::Width;
                    self.dir.width = u32::from(c - b'0');
                    ParseStatus::Continue
                }
                _ => self.on_type(c),
            },
            DirectiveState::Width => match c {
                b'0'..=b'9' => {
                    match self
                        .dir
                        .width
                        .checked_mul(10)
                        .and_then(|v| v.checked_add(u32::from(c - b'0')))
                    {
                        Some(v) => {
                            self.dir.width = v;
                            ParseStatus::Continue
                        }
                        None => {
                            self.state = DirectiveState::ErrorOverflow;
                            self.dir.width = u32::MAX;
                            ParseStatus::Failed
                        }
                    }
                }
                b'.' => self.start_precision(),
                _ => self.on_type(c),
            },
            DirectiveState::PrecisionStart => match c {
                b'0'..=b'9' => {
                    self.state = DirectiveState::Precision;
                    self.dir.precision = Some(u32::from(c - b'0'));
                    ParseStatus::Continue
                }
                _ => self.on_type(c),
            },
            DirectiveState::Precision => match c {
                b'0'..=b'9' => {
                    let prec = self.dir.precision.unwrap_or(0);
                    match prec
                        .checked_mul(10)
                        .and_then(|v| v.checked_add(u32::from(c - b'0')))
                    {
                        Some(v) => {
                            self.dir.precision = Some(v);
                            ParseStatus::Continue
                        }
                        None => {
                            self.state = DirectiveState::ErrorOverflow;
                            self.dir.precision = Some(u32::MAX);
                            ParseStatus::Failed
                        }
                    }
                }
                _ => self.on_type(c),
            },
            DirectiveState::Subtype => match c {
                b'C' | b'F' | b'H' => {
                    self.state = DirectiveState::Stop;
                    self.dir.subtype = Some(c);
                    ParseStatus::Stop
                }
                _ => {
                    self.state = DirectiveState::ErrorToken;
                    self.dir.subtype = Some(c);
                    ParseStatus::Failed
                }
            },
        }
    }

    fn set_flag(&mut self, set: impl FnOnce(&mut DirectiveFlags)) -> ParseStatus {
        set(&mut self.dir.flags);
        ParseStatus::Continue
    }

    fn start_precision(&mut self) -> ParseStatus {
        self.state = DirectiveState::PrecisionStart;
        // A bare `.` means an explicit precision of zero.
        self.dir.precision = Some(0);
        ParseStatus::Continue
    }

    /// Dispatch the character that terminated the modifier part. It is the
    /// type character itself, not a discarded terminator.
    fn on_type(&mut self, c: u8) -> ParseStatus {
        self.dir.type_char = c;
        if c == b'v' {
            self.state = DirectiveState::Subtype;
            ParseStatus::Continue
        } else if TYPE_ALPHABET.contains(&c) {
            self.state = DirectiveState::Stop;
            ParseStatus::Stop
        } else {
            self.state = DirectiveState::ErrorToken;
            ParseStatus::Failed
        }
    }
}
