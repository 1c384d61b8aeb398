use bytes::BytesMut;

const BOUNDARY: &[u8] = b"--frame\r\n";
const HEADER_END: &[u8] = b"\r\n\r\n";

/// Parse state for the MJPEG multipart stream.
enum ParseState {
    /// Looking for the boundary marker `--frame\r\n`.
    SeekingBoundary,
    /// Found boundary, now looking for end of headers `\r\n\r\n`.
    SeekingHeaderEnd,
    /// Collecting JPEG bytes until the next boundary.
    CollectingJpeg,
}

/// Incremental MJPEG multipart parser. Chunks from the HTTP byte stream go
/// in via [`push`](Self::push); complete JPEG payloads come out as soon as
/// their trailing boundary arrives, however the chunks were split.
pub struct MjpegAssembler {
    buffer: BytesMut,
    state: ParseState,
    jpeg_start: usize,
}

impl MjpegAssembler {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(256 * 1024),
            state: ParseState::SeekingBoundary,
            jpeg_start: 0,
        }
    }

    /// Feed one chunk of stream bytes, returning every JPEG completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        loop {
            match self.state {
                ParseState::SeekingBoundary => {
                    if let Some(pos) = find_subsequence(&self.buffer, BOUNDARY) {
                        // Discard everything up to and including the boundary
                        let _ = self.buffer.split_to(pos + BOUNDARY.len());
                        self.state = ParseState::SeekingHeaderEnd;
                    } else {
                        // Keep last few bytes in case boundary spans chunks
                        if self.buffer.len() > BOUNDARY.len() {
                            let _ = self.buffer.split_to(self.buffer.len() - BOUNDARY.len());
                        }
                        break;
                    }
                }
                ParseState::SeekingHeaderEnd => {
                    if let Some(pos) = find_subsequence(&self.buffer, HEADER_END) {
                        // Discard headers
                        let _ = self.buffer.split_to(pos + HEADER_END.len());
                        self.jpeg_start = 0;
                        self.state = ParseState::CollectingJpeg;
                    } else {
                        break;
                    }
                }
                ParseState::CollectingJpeg => {
                    // The next boundary marks where the JPEG ends
                    if let Some(pos) = find_subsequence(&self.buffer[self.jpeg_start..], BOUNDARY)
                    {
                        let jpeg_end = self.jpeg_start + pos;
                        // Strip trailing \r\n before boundary
                        let end = if jpeg_end >= 2
                            && self.buffer[jpeg_end - 2] == b'\r'
                            && self.buffer[jpeg_end - 1] == b'\n'
                        {
                            jpeg_end - 2
                        } else {
                            jpeg_end
                        };

                        let jpeg_data = self.buffer[..end].to_vec();
                        let _ = self.buffer.split_to(jpeg_end + BOUNDARY.len());
                        if !jpeg_data.is_empty() {
                            frames.push(jpeg_data);
                        }

                        // Already past the boundary, go to header parsing
                        self.state = ParseState::SeekingHeaderEnd;
                    } else {
                        // No boundary yet; remember how far we scanned so the
                        // next chunk does not re-scan old data
                        self.jpeg_start = if self.buffer.len() > BOUNDARY.len() {
                            self.buffer.len() - BOUNDARY.len()
                        } else {
                            0
                        };
                        break;
                    }
                }
            }
        }

        frames
    }
}

impl Default for MjpegAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Find the position of `needle` in `haystack`.
fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(payload: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"--frame\r\n");
        bytes.extend_from_slice(b"Content-Type: image/jpeg\r\n\r\n");
        bytes.extend_from_slice(payload);
        bytes.extend_from_slice(b"\r\n");
        bytes
    }

    #[test]
    fn one_complete_part_in_one_chunk() {
        let mut assembler = MjpegAssembler::new();
        let mut stream = part(&[0xFF, 0xD8, 0x01, 0x02, 0xFF, 0xD9]);
        stream.extend_from_slice(b"--frame\r\n");
        let frames = assembler.push(&stream);
        assert_eq!(frames, vec![vec![0xFF, 0xD8, 0x01, 0x02, 0xFF, 0xD9]]);
    }

    #[test]
    fn payload_split_across_chunks() {
        let mut assembler = MjpegAssembler::new();
        let mut stream = part(&[0xFF, 0xD8, 0xAA, 0xBB, 0xFF, 0xD9]);
        stream.extend_from_slice(b"--frame\r\n");
        let (a, b) = stream.split_at(15);
        assert!(assembler.push(a).is_empty());
        let frames = assembler.push(b);
        assert_eq!(frames, vec![vec![0xFF, 0xD8, 0xAA, 0xBB, 0xFF, 0xD9]]);
    }

    #[test]
    fn multiple_parts_in_one_chunk() {
        let mut assembler = MjpegAssembler::new();
        let mut stream = part(&[1, 2, 3]);
        stream.extend_from_slice(&part(&[4, 5, 6]));
        stream.extend_from_slice(b"--frame\r\n");
        let frames = assembler.push(&stream);
        assert_eq!(frames, vec![vec![1, 2, 3], vec![4, 5, 6]]);
    }

    #[test]
    fn garbage_before_the_first_boundary_is_skipped() {
        let mut assembler = MjpegAssembler::new();
        let mut stream = b"HTTP noise".to_vec();
        stream.extend_from_slice(&part(&[9, 9, 9]));
        stream.extend_from_slice(b"--frame\r\n");
        let frames = assembler.push(&stream);
        assert_eq!(frames, vec![vec![9, 9, 9]]);
    }

    #[test]
    fn byte_at_a_time_delivery_still_assembles() {
        let mut assembler = MjpegAssembler::new();
        let mut stream = part(&[0xDE, 0xAD, 0xBE, 0xEF]);
        stream.extend_from_slice(b"--frame\r\n");
        let mut frames = Vec::new();
        for byte in stream {
            frames.extend(assembler.push(&[byte]));
        }
        assert_eq!(frames, vec![vec![0xDE, 0xAD, 0xBE, 0xEF]]);
    }
}
