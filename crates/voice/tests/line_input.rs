use robovox_core::error::SpeechError;
use robovox_core::speech::{SpeechInput, TranscriptEvent};
use robovox_voice::LineSpeechInput;
use tokio::io::BufReader;

async fn collect(input: &LineSpeechInput) -> Vec<TranscriptEvent> {
    let mut rx = input.start().await.unwrap();
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn lines_become_utterances_until_eof() {
    let input = LineSpeechInput::new(BufReader::new(
        &b"move forward\n\nturn left and...\nstop\n"[..],
    ));

    let events = collect(&input).await;

    assert_eq!(
        events,
        vec![
            TranscriptEvent::Fragment("move forward".into()),
            TranscriptEvent::EndOfUtterance,
            TranscriptEvent::Fragment("turn left and".into()),
            TranscriptEvent::Fragment("stop".into()),
            TranscriptEvent::EndOfUtterance,
        ]
    );
}

#[tokio::test]
async fn quit_ends_the_stream_early() {
    let input = LineSpeechInput::new(BufReader::new(&b"hello\nquit\nnever read\n"[..]));

    let events = collect(&input).await;

    assert_eq!(events.len(), 2);
    assert_eq!(events[0], TranscriptEvent::Fragment("hello".into()));
}

#[tokio::test]
async fn recognizer_errors_pass_through() {
    let input = LineSpeechInput::new(BufReader::new(&b"!error mic unplugged\n"[..]));

    let events = collect(&input).await;

    assert_eq!(events, vec![TranscriptEvent::Error("mic unplugged".into())]);
}

#[tokio::test]
async fn reader_is_consumed_once() {
    let input = LineSpeechInput::new(BufReader::new(&b""[..]));
    assert!(collect(&input).await.is_empty());
    assert!(matches!(input.start().await, Err(SpeechError::InputClosed)));
}
