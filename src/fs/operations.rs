use tokio::io::{self, AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

/// Reads the last non-empty line of a file without reading the whole file. Trailing newlines are
/// skipped. Used to peek at a journal's latest revision.
///
/// Leaves the cursor at the end of the file.
pub async fn read_last_line(
    file: &mut (impl AsyncSeek + AsyncRead + Unpin),
    buffer: &mut [u8],
) -> Result<Option<String>, io::Error> {
    let end = file.seek(io::SeekFrom::End(0)).await?;
    let mut position = end;
    // Bytes of the last line, collected back to front one chunk at a time.
    let mut collected: Vec<u8> = Vec::new();
    let mut seen_content = false;

    'outer: while position > 0 {
        let chunk = u64::min(position, buffer.len() as u64) as usize;
        position -= chunk as u64;
        file.seek(io::SeekFrom::Start(position)).await?;
        file.read_exact(&mut buffer[..chunk]).await?;

        for &byte in buffer[..chunk].iter().rev() {
            if byte == b'\n' {
                if seen_content {
                    break 'outer;
                }
                continue;
            }
            seen_content = true;
            collected.push(byte);
        }
    }

    file.seek(io::SeekFrom::End(0)).await?;

    if collected.is_empty() {
        return Ok(None);
    }
    collected.reverse();
    String::from_utf8(collected)
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use anyhow::Result;
    use tempfile::tempfile;

    use super::read_last_line;

    async fn last_line_of(content: &str, buffer_size: usize) -> Result<Option<String>> {
        let mut file = tempfile()?;
        file.write_all(content.as_bytes())?;
        let mut file = tokio::fs::File::from_std(file);
        Ok(read_last_line(&mut file, vec![0; buffer_size].as_mut_slice()).await?)
    }

    #[tokio::test]
    async fn last_line_with_trailing_newline() -> Result<()> {
        let content = "{\"rev\":1}\n{\"rev\":2}\n";
        assert_eq!(last_line_of(content, 1024).await?.as_deref(), Some("{\"rev\":2}"));
        Ok(())
    }

    #[tokio::test]
    async fn last_line_without_trailing_newline() -> Result<()> {
        let content = "first\nsecond";
        assert_eq!(last_line_of(content, 1024).await?.as_deref(), Some("second"));
        Ok(())
    }

    #[tokio::test]
    async fn last_line_spanning_chunks() -> Result<()> {
        let content = "first line\nthe second line is long\n\n";
        assert_eq!(
            last_line_of(content, 3).await?.as_deref(),
            Some("the second line is long")
        );
        Ok(())
    }

    #[tokio::test]
    async fn last_line_of_empty_file() -> Result<()> {
        assert_eq!(last_line_of("", 16).await?, None);
        assert_eq!(last_line_of("\n\n", 16).await?, None);
        Ok(())
    }
}
