//! The reels feed page.
//!
//! States: not started, then started with one of idle, form-active,
//! generating or refreshing. Videos autoplay while at least half visible and
//! pause while the form has focus.

pub const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Sports Reels</title>
    <link href="https://cdn.jsdelivr.net/npm/tailwindcss@3.2.7/dist/tailwind.min.css" rel="stylesheet">
    <style>
      .reel-item { height: 100vh; scroll-snap-align: start; position: relative; }
      .reel-video { width: 100%; height: 100%; object-fit: cover; background: #000; }
      .overlay { position: absolute; bottom: 4rem; left: 1rem; color: #fff; text-shadow: 0 1px 3px #000; }
      #feed { scroll-snap-type: y mandatory; }
    </style>
  </head>
  <body class="bg-gray-900 text-white">
    <div id="start-screen" class="h-screen flex flex-col items-center justify-center space-y-4">
      <h1 class="text-3xl font-bold">Welcome to Sports Reels!</h1>
      <button id="start" class="bg-blue-500 px-4 py-2 rounded">Start Reels</button>
    </div>

    <div id="app" class="hidden">
      <div class="p-4 space-y-4 max-w-xl mx-auto">
        <h1 class="text-2xl font-bold">Sports Reels</h1>
        <h2>Create or Search Sports Reels (scroll down to view reels!)</h2>
        <label class="block">Search:
          <input id="search" type="text" class="text-black rounded w-full p-1" placeholder="e.g., Lionel Messi" />
        </label>
        <form id="generate" class="space-y-2">
          <label class="block">Celebrity Name:
            <input name="celebrityName" class="text-black rounded w-full p-1" required />
          </label>
          <label class="block">Title:
            <input name="title" class="text-black rounded w-full p-1" required />
          </label>
          <label class="block">Description:
            <input name="description" class="text-black rounded w-full p-1" required />
          </label>
          <label class="block">Custom Script (Narration):
            <textarea name="customScript" class="text-black rounded w-full p-1 h-24" required></textarea>
          </label>
          <label class="block">Video URL (auto-generated):
            <input name="videoUrl" class="text-black rounded w-full p-1" readonly />
          </label>
          <button id="submit" type="submit" class="bg-green-500 px-4 py-2 rounded">Generate/Re-generate Reel</button>
          <p id="error" class="text-red-400"></p>
        </form>
      </div>
      <p id="no-results" class="p-4 hidden"></p>
      <div id="feed"></div>
    </div>

    <script>
      const POLL_ATTEMPTS = 180;
      const POLL_INTERVAL_MS = 5000;
      const SUBMIT_TIMEOUT_MS = 15 * 60 * 1000;

      let videos = [];
      let displayed = [];
      let mode = 'idle';
      let observer = null;

      const $ = (id) => document.getElementById(id);
      const form = $('generate');

      function slug(name) {
        return name.trim().toLowerCase().replace(/ /g, '-');
      }

      function videoSrc(url) {
        return url.startsWith('/') ? url : '/api/proxy-video?url=' + encodeURIComponent(url);
      }

      function filterVideos(query, list) {
        const q = query.trim().toLowerCase();
        if (!q) return list;
        return list.filter((v) =>
          [v.celebrityName, v.title, v.description].some((f) => (f || '').toLowerCase().includes(q)));
      }

      function playVisible(video) {
        if (mode === 'form-active' || !video.paused) return;
        video.muted = false;
        video.play().catch(() => {
          video.muted = true;
          video.play().catch((err) => console.error('autoplay failed', err));
        });
      }

      function render() {
        if (observer) observer.disconnect();
        const feed = $('feed');
        feed.innerHTML = '';
        const query = $('search').value;
        $('no-results').classList.toggle('hidden', displayed.length > 0 || !query);
        $('no-results').textContent = 'No videos found for "' + query + '"';

        observer = new IntersectionObserver((entries) => {
          entries.forEach((entry) => {
            if (entry.isIntersecting && mode !== 'form-active') playVisible(entry.target);
            else entry.target.pause();
          });
        }, { threshold: 0.5 });

        displayed.forEach((v) => {
          const item = document.createElement('div');
          item.className = 'reel-item';
          const video = document.createElement('video');
          video.className = 'reel-video';
          video.src = videoSrc(v.videoUrl) + (v.videoUrl.includes('?') ? '&' : '?') + 't=' + Date.now();
          video.loop = true;
          video.controls = true;
          video.playsInline = true;
          video.preload = 'auto';
          const overlay = document.createElement('div');
          overlay.className = 'overlay';
          const title = document.createElement('h2');
          title.className = 'text-xl font-bold';
          title.textContent = v.title;
          const description = document.createElement('p');
          description.textContent = v.description;
          overlay.append(title, description);
          item.append(video, overlay);
          feed.append(item);
          observer.observe(video);
        });
      }

      function applySearch() {
        displayed = filterVideos($('search').value, videos);
        render();
      }

      async function loadVideos(url) {
        const response = await fetch(url, { cache: 'no-store' });
        if (!response.ok) throw new Error('Failed to load videos: ' + response.status);
        const data = await response.json();
        videos = data.videos || [];
        applySearch();
      }

      async function refreshVideos() {
        mode = 'refreshing';
        try {
          await loadVideos('/api/refresh-videos');
        } catch (err) {
          console.error(err);
        } finally {
          mode = 'idle';
        }
      }

      async function pollVideo(url) {
        for (let i = 0; i < POLL_ATTEMPTS; i++) {
          try {
            const response = await fetch(videoSrc(url), { cache: 'no-store' });
            if (response.ok) return;
          } catch (err) {
            console.log('Video not ready: ' + url);
          }
          await new Promise((resolve) => setTimeout(resolve, POLL_INTERVAL_MS));
        }
        throw new Error('Video generation timed out');
      }

      function pauseAll() {
        document.querySelectorAll('.reel-video').forEach((v) => v.pause());
      }

      function formFocus() {
        if (mode === 'generating') return;
        mode = 'form-active';
        pauseAll();
      }

      function formBlur() {
        if (mode === 'form-active') mode = 'idle';
      }

      form.addEventListener('focusin', formFocus);
      form.addEventListener('focusout', formBlur);
      $('search').addEventListener('focus', formFocus);
      $('search').addEventListener('blur', formBlur);
      $('search').addEventListener('input', applySearch);

      form.celebrityName.addEventListener('input', (e) => {
        form.videoUrl.value = '/videos/' + slug(e.target.value) + '-history.mp4';
      });

      form.addEventListener('submit', async (e) => {
        e.preventDefault();
        $('error').textContent = '';
        mode = 'generating';
        $('submit').disabled = true;
        $('submit').textContent = 'Generating...';

        const payload = Object.fromEntries(new FormData(form).entries());
        const controller = new AbortController();
        const timer = setTimeout(() => controller.abort(), SUBMIT_TIMEOUT_MS);
        try {
          const response = await fetch('/api/generate-video', {
            method: 'POST',
            headers: { 'Content-Type': 'application/json' },
            body: JSON.stringify(payload),
            signal: controller.signal,
          });
          const data = await response.json();
          if (!response.ok) throw new Error(data.error || 'Failed to initiate video generation');
          await pollVideo(data.videoUrl);
          await refreshVideos();
          form.reset();
        } catch (err) {
          $('error').textContent = err.name === 'AbortError' ? 'Request timed out' : err.message;
        } finally {
          clearTimeout(timer);
          mode = 'idle';
          $('submit').disabled = false;
          $('submit').textContent = 'Generate/Re-generate Reel';
        }
      });

      $('start').addEventListener('click', async () => {
        $('start-screen').classList.add('hidden');
        $('app').classList.remove('hidden');
        try {
          await loadVideos('/api/videos');
        } catch (err) {
          console.error(err);
        }
      });
    </script>
  </body>
</html>
"#;
