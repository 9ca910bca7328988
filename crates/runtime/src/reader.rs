//! The S-expression reader.
//!
//! Recursive descent over a byte stream with a pushback stack. Errors
//! follow the interpreter-wide convention: log a diagnostic, resynchronize,
//! yield nil. Only the top-level entry distinguishes a clean end of input
//! from an error inside a form.

use std::io::Read;

use crate::cons::{list2, make_cons};
use crate::interp::Interp;
use crate::strings::make_string;
use crate::symbol::make_symbol;
use crate::value::{Ref, release_ref};

pub struct Reader {
    src: Box<dyn Read>,
    pushback: Vec<u8>,
}

impl Reader {
    pub fn new(src: Box<dyn Read>) -> Reader {
        Reader {
            src,
            pushback: Vec::new(),
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Reader {
        Reader::new(Box::new(std::io::Cursor::new(bytes)))
    }

    fn getc(&mut self) -> Option<u8> {
        if let Some(b) = self.pushback.pop() {
            return Some(b);
        }
        let mut buf = [0u8; 1];
        loop {
            match self.src.read(&mut buf) {
                Ok(0) => return None,
                Ok(_) => return Some(buf[0]),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "read error on input stream");
                    return None;
                }
            }
        }
    }

    fn peekc(&mut self) -> Option<u8> {
        if let Some(&b) = self.pushback.last() {
            return Some(b);
        }
        let b = self.getc()?;
        self.pushback.push(b);
        Some(b)
    }

    fn unget(&mut self, b: u8) {
        self.pushback.push(b);
    }

    fn unget_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes.iter().rev() {
            self.pushback.push(b);
        }
    }
}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | 0x0b | 0x0c)
}

fn is_digit(b: u8) -> bool {
    b.is_ascii_digit()
}

fn skip_whitespace(interp: &mut Interp) {
    loop {
        match interp.reader.peekc() {
            Some(b';') => {
                // Line comment, up to and including the newline.
                loop {
                    match interp.reader.getc() {
                        Some(b'\n') | None => break,
                        Some(_) => {}
                    }
                }
            }
            Some(b) if is_space(b) => {
                interp.reader.getc();
            }
            _ => break,
        }
    }
}

/// Read one form from the interpreter's input. `None` means the input is
/// cleanly exhausted.
pub fn read_form(interp: &mut Interp) -> Option<Ref> {
    skip_whitespace(interp);
    interp.reader.peekc()?;
    Some(read_expr(interp))
}

fn read_expr(interp: &mut Interp) -> Ref {
    skip_whitespace(interp);
    match interp.reader.peekc() {
        None => Ref::Nil,
        Some(b'(') => read_cons(interp),
        Some(b'\'') => read_prefixed(interp, b"quote"),
        Some(b'`') => read_prefixed(interp, b"quasiquote"),
        Some(b',') => read_prefixed(interp, b"unquote"),
        Some(b')') => {
            interp.reader.getc();
            tracing::error!("closing bracket with no matching opening bracket");
            Ref::Nil
        }
        Some(b'"') => read_string(interp),
        Some(b'-' | b'+' | b'.') | Some(b'0'..=b'9') => match read_number(interp) {
            NumScan::Value(v) => v,
            NumScan::NotANumber => read_symbol(interp),
            NumScan::Malformed => {
                tracing::error!("malformed number token");
                skip_to_delimiter(interp);
                Ref::Nil
            }
        },
        Some(_) => read_symbol(interp),
    }
}

fn read_cons(interp: &mut Interp) -> Ref {
    interp.reader.getc();
    skip_whitespace(interp);

    match interp.reader.peekc() {
        None => {
            tracing::error!("opening bracket with no closing bracket");
            Ref::Nil
        }
        Some(b')') => {
            interp.reader.getc();
            // The empty pair is nil.
            Ref::Nil
        }
        Some(_) => {
            let car = read_expr(interp);
            let cdr = read_cons_cdr(interp);
            skip_whitespace(interp);
            if interp.reader.peekc() == Some(b')') {
                interp.reader.getc();
            } else {
                release_ref(interp, car);
                release_ref(interp, cdr);
                tracing::error!("missing closing bracket");
                return Ref::Nil;
            }
            let cons = make_cons(interp, car, cdr);
            release_ref(interp, car);
            release_ref(interp, cdr);
            cons
        }
    }
}

fn read_cons_cdr(interp: &mut Interp) -> Ref {
    skip_whitespace(interp);
    match interp.reader.peekc() {
        None => {
            tracing::error!("input ended inside a list");
            Ref::Nil
        }
        Some(b')') => Ref::Nil,
        Some(b'.') => {
            // Explicit cdr: exactly one expression before the bracket.
            interp.reader.getc();
            read_expr(interp)
        }
        Some(_) => {
            let car = read_expr(interp);
            let cdr = read_cons_cdr(interp);
            let cons = make_cons(interp, car, cdr);
            release_ref(interp, car);
            release_ref(interp, cdr);
            cons
        }
    }
}

fn read_prefixed(interp: &mut Interp, name: &[u8]) -> Ref {
    interp.reader.getc();
    let sym = make_symbol(interp, name);
    let val = read_expr(interp);
    let cons = list2(interp, sym, val);
    release_ref(interp, sym);
    release_ref(interp, val);
    cons
}

/// Decode the character after a backslash. A digit starts a decimal run
/// naming a single byte, mirroring the `\N` form the printer emits for
/// non-graphic bytes (`\0` is its one-digit case). Anything unrecognized is
/// the character itself.
fn read_escape(interp: &mut Interp, c: u8) -> u8 {
    if c.is_ascii_digit() {
        let mut value = (c - b'0') as u32;
        while let Some(d) = interp.reader.peekc() {
            if !d.is_ascii_digit() || value * 10 + (d - b'0') as u32 > 255 {
                break;
            }
            interp.reader.getc();
            value = value * 10 + (d - b'0') as u32;
        }
        return value as u8;
    }
    match c {
        b'r' => b'\r',
        b'n' => b'\n',
        b'b' => 0x08,
        b't' => b'\t',
        other => other,
    }
}

fn read_string(interp: &mut Interp) -> Ref {
    interp.reader.getc();
    let mut buf = Vec::new();
    loop {
        match interp.reader.peekc() {
            None => {
                tracing::error!("unterminated string literal");
                return Ref::Nil;
            }
            Some(b'"') => {
                interp.reader.getc();
                break;
            }
            Some(b'\\') => {
                interp.reader.getc();
                match interp.reader.getc() {
                    Some(e) => buf.push(read_escape(interp, e)),
                    None => {
                        tracing::error!("unterminated string literal");
                        return Ref::Nil;
                    }
                }
            }
            Some(_) => {
                if let Some(b) = interp.reader.getc() {
                    buf.push(b);
                }
            }
        }
    }
    make_string(interp, &buf)
}

fn read_symbol(interp: &mut Interp) -> Ref {
    let mut buf = Vec::new();
    if interp.reader.peekc() == Some(b'|') {
        interp.reader.getc();
        loop {
            match interp.reader.peekc() {
                None => {
                    tracing::error!("unterminated pipe-quoted symbol");
                    return Ref::Nil;
                }
                Some(b'|') => {
                    interp.reader.getc();
                    break;
                }
                Some(b'\\') => {
                    interp.reader.getc();
                    match interp.reader.getc() {
                        Some(e) => buf.push(read_escape(interp, e)),
                        None => {
                            tracing::error!("unterminated pipe-quoted symbol");
                            return Ref::Nil;
                        }
                    }
                }
                Some(_) => {
                    if let Some(b) = interp.reader.getc() {
                        buf.push(b);
                    }
                }
            }
        }
    } else {
        loop {
            match interp.reader.peekc() {
                None => break,
                Some(b) if is_space(b) || b == b')' => break,
                Some(b'\\') => {
                    interp.reader.getc();
                    match interp.reader.getc() {
                        Some(e) => buf.push(read_escape(interp, e)),
                        None => break,
                    }
                }
                Some(_) => {
                    if let Some(b) = interp.reader.getc() {
                        buf.push(b);
                    }
                }
            }
        }
    }
    make_symbol(interp, &buf)
}

enum NumScan {
    Value(Ref),
    /// The consumed prefix was pushed back; reread it as a symbol.
    NotANumber,
    Malformed,
}

fn is_number_delimiter(b: Option<u8>) -> bool {
    match b {
        None => true,
        Some(b) => is_space(b) || matches!(b, b')' | b'(' | b';'),
    }
}

fn skip_to_delimiter(interp: &mut Interp) {
    while !is_number_delimiter(interp.reader.peekc()) {
        interp.reader.getc();
    }
}

fn give_up(interp: &mut Interp, buf: &[u8]) -> NumScan {
    interp.reader.unget_bytes(buf);
    NumScan::NotANumber
}

fn read_number(interp: &mut Interp) -> NumScan {
    let mut buf: Vec<u8> = Vec::new();
    let mut has_digits = false;
    let mut is_int = true;

    let mut c = interp.reader.peekc();
    if matches!(c, Some(b'-' | b'+')) {
        if let Some(b) = interp.reader.getc() {
            buf.push(b);
        }
        c = interp.reader.peekc();
        if !matches!(c, Some(b) if is_digit(b)) {
            // A sign with no value is a symbol.
            return give_up(interp, &buf);
        }
    }

    while matches!(c, Some(b) if is_digit(b)) {
        has_digits = true;
        if let Some(b) = interp.reader.getc() {
            buf.push(b);
        }
        c = interp.reader.peekc();
    }

    if c == Some(b'.') {
        is_int = false;
        if let Some(b) = interp.reader.getc() {
            buf.push(b);
        }
        c = interp.reader.peekc();
        if matches!(c, Some(b) if is_digit(b)) {
            has_digits = true;
        }
        if !has_digits {
            // A bare dot is a symbol.
            return give_up(interp, &buf);
        }
        while matches!(c, Some(b) if is_digit(b)) {
            if let Some(b) = interp.reader.getc() {
                buf.push(b);
            }
            c = interp.reader.peekc();
        }
    }

    if matches!(c, Some(b'e' | b'E')) {
        if !has_digits {
            return give_up(interp, &buf);
        }
        is_int = false;
        if let Some(b) = interp.reader.getc() {
            buf.push(b);
        }
        c = interp.reader.peekc();
        if matches!(c, Some(b'-' | b'+')) {
            if let Some(b) = interp.reader.getc() {
                buf.push(b);
            }
            c = interp.reader.peekc();
        }
        if !matches!(c, Some(b) if is_digit(b)) {
            // Digits followed by a dangling exponent marker.
            return NumScan::Malformed;
        }
        while matches!(c, Some(b) if is_digit(b)) {
            if let Some(b) = interp.reader.getc() {
                buf.push(b);
            }
            c = interp.reader.peekc();
        }
    }

    if !is_number_delimiter(interp.reader.peekc()) {
        return NumScan::Malformed;
    }

    let text = String::from_utf8_lossy(&buf);
    if is_int {
        match text.parse::<i64>() {
            Ok(n) => NumScan::Value(Ref::Int(n)),
            // Out of integer range: fall back to a real.
            Err(_) => match text.parse::<f64>() {
                Ok(x) => NumScan::Value(Ref::Real(x)),
                Err(_) => NumScan::Malformed,
            },
        }
    } else {
        match text.parse::<f64>() {
            Ok(x) => NumScan::Value(Ref::Real(x)),
            Err(_) => NumScan::Malformed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pushback_is_lifo() {
        let mut r = Reader::from_bytes(b"cd".to_vec());
        r.unget(b'b');
        r.unget(b'a');
        assert_eq!(r.getc(), Some(b'a'));
        assert_eq!(r.getc(), Some(b'b'));
        assert_eq!(r.getc(), Some(b'c'));
        assert_eq!(r.peekc(), Some(b'd'));
        assert_eq!(r.getc(), Some(b'd'));
        assert_eq!(r.getc(), None);
    }

    #[test]
    fn unget_bytes_preserves_order() {
        let mut r = Reader::from_bytes(Vec::new());
        r.unget_bytes(b"abc");
        assert_eq!(r.getc(), Some(b'a'));
        assert_eq!(r.getc(), Some(b'b'));
        assert_eq!(r.getc(), Some(b'c'));
        assert_eq!(r.getc(), None);
    }
}
