// Copyright © 2018 Cormac O'Brien
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of this software
// and associated documentation files (the "Software"), to deal in the Software without
// restriction, including without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all copies or
// substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING
// BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
// DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! Parsing for the entity dictionary text stored in the entities lump.

use std::collections::HashMap;

use nom::IResult;

named!(eol, alt!(tag!("\r\n") | tag!("\n")));

// Parse quoted strings
named!(
    quoted<&str>,
    map_res!(
        delimited!(tag!("\""), take_until!("\""), tag!("\"")),
        ::std::str::from_utf8
    )
);

// Parse a pair of quoted strings separated by a space and followed by a line ending
named!(
    key_val<(&str, &str)>,
    terminated!(separated_pair!(quoted, tag!(" "), quoted), eol)
);

named!(
    entity_map<HashMap<String, String>>,
    map!(
        delimited!(
            terminated!(tag!("{"), eol),
            many0!(key_val),
            terminated!(tag!("}"), opt!(eol))
        ),
        |tuples| {
            let mut map = HashMap::new();
            for (k, v) in tuples {
                map.insert(k.to_owned(), v.to_owned());
            }
            map
        }
    )
);

named!(
    entity_maps<Vec<HashMap<String, String>>>,
    many0!(entity_map)
);

/// Parses the entity dictionaries out of the entities lump text.
///
/// Returns `None` if the text does not start with a well-formed block; trailing garbage after
/// the last block is ignored.
pub fn entities<S>(src: S) -> Option<Vec<HashMap<String, String>>>
where
    S: AsRef<str>,
{
    let src = src.as_ref().trim();
    if src.is_empty() {
        return Some(Vec::new());
    }

    // the sentinel makes the streaming parsers fail instead of reporting incomplete input when
    // they run off the end of the lump; two bytes covers the longest literal
    let mut buf = src.as_bytes().to_vec();
    buf.extend_from_slice(&[0, 0]);

    match entity_maps(&buf) {
        IResult::Done(_, ref maps) if !maps.is_empty() => Some(maps.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_entities_single_block() {
        let src = "{\n\"classname\" \"worldspawn\"\n\"skyname\" \"sky_dust\"\n}\n";
        let ents = entities(src).unwrap();
        assert_eq!(ents.len(), 1);
        assert_eq!(ents[0]["classname"], "worldspawn");
        assert_eq!(ents[0]["skyname"], "sky_dust");
    }

    #[test]
    fn test_entities_multiple_blocks_crlf() {
        let src = "{\r\n\"classname\" \"worldspawn\"\r\n}\r\n{\r\n\"classname\" \"info_player_terrorist\"\r\n\"origin\" \"3306 431 1723\"\r\n}\r\n";
        let ents = entities(src).unwrap();
        assert_eq!(ents.len(), 2);
        assert_eq!(ents[1]["origin"], "3306 431 1723");
    }

    #[test]
    fn test_entities_empty() {
        assert_eq!(entities("").unwrap().len(), 0);
    }

    #[test]
    fn test_entities_malformed() {
        assert!(entities("classname worldspawn").is_none());
    }
}
